//! Persistence gateway and survey core for Surveyor.
//!
//! `SurveyDb` is the single way to reach storage. Its methods implement the
//! survey lifecycle, the ordering engine, version cloning and the record
//! collector; every one of them takes the caller's [`Principal`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use surveyor_db::{NewQuestion, SurveyDb};
//!
//! let db = SurveyDb::open("~/.surveyor/surveyor.sqlite3").await?;
//! let admin = db.resolve_principal(admin_id).await?;
//!
//! let survey = db.create_survey(&admin, "Census", Some("Household census")).await?;
//! db.create_question(&admin, survey.id, NewQuestion::new("Household size")).await?;
//! db.lock_survey(&admin, survey.id).await?;
//! ```

mod error;
mod pool;
mod principal;
mod schema;
mod types;

pub mod ordering;

// Method implementations organized by domain
mod access;
mod options;
mod questions;
mod records;
mod surveys;
mod users;
mod versioning;

pub use error::{DbError, Result};
pub use ordering::{Direction, OrderingError};
pub use pool::{create_pool, DbConfig};
pub use principal::{Principal, Role};
pub use types::*;
pub use users::RegistrationPolicy;

pub use surveyor_ids::{
    AnswerId, GrantId, LinkId, OptionId, QuestionId, RecordId, SurveyId, UserId,
};

use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use tracing::info;

/// Behavior switches that differ between deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbOptions {
    /// Locking a survey also grants the locking admin access to it
    pub grant_on_lock: bool,
    /// A submitted record rejects further answer updates and submits
    pub seal_on_submit: bool,
}

/// Unified database for all Surveyor operations.
#[derive(Clone)]
pub struct SurveyDb {
    pool: SqlitePool,
    options: DbOptions,
}

impl SurveyDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self::connect(DbConfig::sqlite(path)).await?;
        info!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        Self::connect(DbConfig::sqlite(path).existing_only()).await
    }

    /// Fresh in-memory database.
    pub async fn open_memory() -> Result<Self> {
        Self::connect(DbConfig::sqlite_memory()).await
    }

    /// Connect with an explicit configuration and ensure the schema.
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let pool = create_pool(&config).await?;
        let db = Self {
            pool,
            options: DbOptions::default(),
        };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub fn with_options(mut self, options: DbOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> DbOptions {
        self.options
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Transaction for a read-then-write operation.
    ///
    /// Holds the write lock from `BEGIN IMMEDIATE` on, so concurrent writers
    /// queue on the busy timeout instead of hitting `SQLITE_BUSY_SNAPSHOT`.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

// Timestamp utilities
impl SurveyDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }

    pub(crate) fn opt_millis_to_datetime(
        millis: Option<i64>,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        millis.map(Self::millis_to_datetime)
    }
}

/// Trim `value` and reject it when nothing is left.
pub(crate) fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DbError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional value, mapping blank input to `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
