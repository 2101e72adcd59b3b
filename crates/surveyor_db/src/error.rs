//! Error types for the database layer.

use surveyor_protocol::{ErrorBody, ErrorCode};
use thiserror::Error;

use crate::ordering::OrderingError;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Principal missing or not resolvable
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Principal lacks the role or access grant
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Locked, deleted, already locked, or duplicate key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reorder rejected by the ordering engine
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value that does not decode
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("Duplicate entry: {}", db_err.message()));
            }
        }
        Self::Sqlx(err)
    }
}

impl DbError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Validation(_) | Self::Ordering(_) => ErrorCode::ValidationError,
            Self::Sqlx(_) | Self::Io(_) | Self::InvalidState(_) | Self::Serialization(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Message without the variant prefix, for response payloads.
    pub fn message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code(), self.message())
    }

    /// Replace the message of a `Conflict`, keeping every other error as is.
    pub(crate) fn reword_conflict(self, msg: &str) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(msg.to_string()),
            other => other,
        }
    }
}
