//! Shared helpers for integration tests
//!
//! Starts a real `HttpServer` on port 0 backed by an in-memory SQLite
//! database, a temp-dir thumbnail store and an in-memory object store.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tubely::assets::ThumbnailStore;
use tubely::auth::jwt::{JwtAuthenticator, JwtIssuer};
use tubely::config::{
    AssetsConfig, AuthConfig, Config, DatabaseConfig, MetricsConfig, S3Config, ServerConfig,
};
use tubely::db::{CreateVideoParams, Database, Video};
use tubely::handlers::AppState;
use tubely::s3::{object_url, ObjectStore, PutObjectResponse, S3ClientConfig, S3ClientError};
use tubely::server::HttpServer;
use tubely::upload::UploadLimits;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ISSUER: &str = "tubely-access";
pub const PUBLIC_URL: &str = "http://tubely.test";

/// Limits small enough that oversize bodies fit in one socket write
pub const TEST_LIMITS: UploadLimits = UploadLimits {
    thumbnail: 1024,
    video: 4096,
};

/// Stored object: bytes and content type
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory object store double
pub struct MemoryObjectStore {
    config: S3ClientConfig,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            config: S3ClientConfig {
                bucket: "tubely-test".into(),
                region: "us-east-1".into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
            },
            objects: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every subsequent put fail
    pub fn fail_puts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn objects(&self) -> HashMap<String, StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<PutObjectResponse, S3ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(S3ClientError::RequestError("injected failure".into()));
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| S3ClientError::BodyError(e.to_string()))?;

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );

        Ok(PutObjectResponse {
            etag: Some(format!("\"{}\"", Uuid::new_v4())),
        })
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.config, key)
    }
}

/// A running server plus handles onto its storage
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub object_store: Arc<MemoryObjectStore>,
    pub dir: TempDir,
    issuer: JwtIssuer,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_limits(TEST_LIMITS).await
    }

    pub async fn start_with_limits(limits: UploadLimits) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.assets.temp_dir).unwrap();

        let object_store = Arc::new(MemoryObjectStore::new());
        let state = AppState {
            db: Arc::new(Database::open_in_memory().unwrap()),
            thumbnails: Arc::new(ThumbnailStore::open(&config.assets.root).unwrap()),
            object_store: object_store.clone(),
            authenticator: Arc::new(JwtAuthenticator::new_hs256(JWT_SECRET, ISSUER)),
            limits,
            config: Arc::new(config),
        };

        let server = HttpServer::bind("127.0.0.1:0", state.clone())
            .await
            .expect("server should bind");
        let addr = server.local_addr();

        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            state,
            object_store,
            dir,
            issuer: JwtIssuer::new_hs256(JWT_SECRET, ISSUER),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.issuer
            .issue(user_id, chrono::Duration::hours(1))
            .unwrap()
    }

    /// Insert a record owned by `owner` directly into the database
    pub fn create_video(&self, owner: Uuid) -> Video {
        self.state
            .db
            .create_video(&CreateVideoParams {
                title: "Boots demo".into(),
                description: "A video about boots".into(),
                user_id: owner,
            })
            .unwrap()
    }

    pub fn get_video(&self, id: Uuid) -> Video {
        self.state.db.get_video(id).unwrap().unwrap()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.state.config.assets.temp_dir.clone()
    }

    /// Number of entries left in the upload temp dir
    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir()).unwrap().count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn test_config(root: &Path) -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            public_url: Some(PUBLIC_URL.into()),
        },
        database: DatabaseConfig {
            path: root.join("tubely.db"),
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.into(),
            issuer: ISSUER.into(),
        },
        assets: AssetsConfig {
            root: root.join("assets"),
            temp_dir: root.join("tmp"),
        },
        s3: S3Config {
            bucket: "tubely-test".into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        },
        metrics: MetricsConfig {
            enabled: false,
            address: "127.0.0.1:0".into(),
        },
    }
}

pub fn file_part(data: Vec<u8>, file_name: &str, media_type: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str(media_type)
        .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
