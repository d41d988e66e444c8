//! HTTP server for Tubely
//!
//! Built on `hyper` and `tokio`: one task per connection, HTTP/1.1, and a
//! single dispatch function that maps each [`Route`] to its handler.
//!
//! # Example
//!
//! ```no_run
//! use tubely::config::Config;
//! use tubely::handlers::AppState;
//! use tubely::server::HttpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let address = config.server.address.clone();
//! let state = AppState::from_config(config).await?;
//!
//! let server = HttpServer::bind(&address, state).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::handlers::{self, thumbnails, videos, ApiError, ApiResponse, AppState};
use crate::metrics;
use crate::router::{Route, RouterError};
use crate::server::ServerError;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, Instrument};

/// HTTP server bound to a listening socket
pub struct HttpServer {
    state: AppState,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HttpServer {
    /// Bind to `address`. Port 0 lets the OS pick a free port.
    pub async fn bind(address: &str, state: AppState) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        // Actual bound address, important for port 0
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(address = %local_addr, "Server bound");

        Ok(Self {
            state,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped.
    ///
    /// Each connection is served on its own task; a failing connection is
    /// logged and does not stop the loop.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "Starting HTTP server");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let state = self.state.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(handle_request(req, &state).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(peer = %peer_addr, error = %e, "Error serving connection");
                }
            });
        }
    }
}

/// Route a request, run its handler and render any error
async fn handle_request(req: Request<Incoming>, state: &AppState) -> ApiResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http.request",
        http.method = %method,
        http.target = %path,
        http.status_code = tracing::field::Empty,
    );

    async move {
        let (route_name, result) = match Route::parse(&method, &path) {
            Ok(route) => (route.name(), dispatch(route, req, state).await),
            Err(e) => ("unmatched", Err(route_error(e))),
        };

        let response = result.unwrap_or_else(|e| {
            if e.status().is_server_error() {
                error!(error = %e, "Request failed");
            } else {
                info!(status = e.status().as_u16(), error = %e, "Request rejected");
            }
            e.into_response()
        });

        let status = response.status().as_u16();
        tracing::Span::current().record("http.status_code", status);
        metrics::record_response(route_name, status);

        response
    }
    .instrument(span)
    .await
}

async fn dispatch(
    route: Route,
    req: Request<Incoming>,
    state: &AppState,
) -> Result<ApiResponse, ApiError> {
    match route {
        Route::Health => Ok(handlers::health()),
        Route::GetThumbnail { video_id } => thumbnails::get_thumbnail(state, &video_id).await,
        Route::UploadThumbnail { video_id } => {
            thumbnails::upload_thumbnail(state, req, &video_id).await
        }
        Route::UploadVideo { video_id } => videos::upload_video(state, req, &video_id).await,
        Route::GetVideo { video_id } => videos::get_video(state, &video_id).await,
        Route::CreateVideo => videos::create_video(state, req).await,
        Route::ListVideos => videos::list_videos(state, req).await,
    }
}

fn route_error(e: RouterError) -> ApiError {
    match e {
        RouterError::NotFound(_) => ApiError::NotFound("Not Found".into()),
        RouterError::MethodNotAllowed { .. } => ApiError::MethodNotAllowed(e.to_string()),
    }
}
