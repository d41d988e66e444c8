//! Record store
//!
//! Embedded SQLite database holding video metadata rows. Accessors live in
//! submodules and are implemented directly on [`Database`].

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub mod videos;

pub use videos::{CreateVideoParams, Video};

/// Record store errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed record store.
///
/// A single connection guarded by a mutex; every accessor is one short
/// statement, so callers never hold the lock across an await point.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create or open the database file at `path`
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers from blocking behind an in-flight update
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                video_url TEXT,
                user_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_videos_user_id ON videos(user_id);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }
}
