//! Database pool creation.
//!
//! SQLite only. File databases run in WAL mode with a small pool; in-memory
//! databases are pinned to a single connection that never idles out, since
//! every new in-memory connection would otherwise see an empty database.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use surveyor_protocol::defaults::DEFAULT_MAX_CONNECTIONS;
use tracing::info;

use crate::error::Result;

/// How long a writer waits for the SQLite write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// Create the database file when missing
    pub create_if_missing: bool,
    in_memory: bool,
}

impl DbConfig {
    /// File-backed SQLite configuration.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            create_if_missing: true,
            in_memory: false,
        }
    }

    /// In-memory SQLite configuration (for testing).
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            create_if_missing: true,
            in_memory: true,
        }
    }

    /// Set maximum connections. Ignored for in-memory databases.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        if !self.in_memory {
            self.max_connections = max.max(1);
        }
        self
    }

    /// Fail instead of creating a missing database file.
    pub fn existing_only(mut self) -> Self {
        self.create_if_missing = false;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }
}

/// Create a database pool from configuration.
pub async fn create_pool(config: &DbConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(config.create_if_missing)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    if !config.in_memory {
        // WAL mode for better concurrent access
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.in_memory {
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;
    info!(url = %config.url, max_connections = config.max_connections, "Connected to SQLite");
    Ok(pool)
}
