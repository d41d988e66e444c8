//! Tubely - video and thumbnail upload service

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tubely::auth::jwt::JwtIssuer;
use tubely::config::Config;
use tubely::handlers::AppState;
use tubely::metrics::server::{MetricsServer, MetricsServerConfig};
use tubely::server::HttpServer;
use uuid::Uuid;

/// Tubely - upload and serve video assets
#[derive(Parser, Debug)]
#[command(name = "tubely")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print an access token for a user id
    IssueToken {
        #[arg(long)]
        user_id: Uuid,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expires_in_secs: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    let config = Config::load(&args.config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, &args.config).await,
        Command::IssueToken {
            user_id,
            expires_in_secs,
        } => {
            let issuer = JwtIssuer::new_hs256(&config.auth.jwt_secret, &config.auth.issuer);
            let token = issuer.issue(user_id, chrono::Duration::seconds(expires_in_secs))?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: Config, config_path: &Path) -> anyhow::Result<()> {
    info!(version = tubely::VERSION, "Starting Tubely");
    info!(path = ?config_path, "Loaded configuration");

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(MetricsServerConfig {
            address: config.metrics.address.clone(),
        });
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let address = config.server.address.clone();
    let state = AppState::from_config(config).await?;
    let server = HttpServer::bind(&address, state).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    if let Some(ref mut metrics_server) = metrics_server {
        metrics_server.shutdown().await;
    }

    Ok(())
}
