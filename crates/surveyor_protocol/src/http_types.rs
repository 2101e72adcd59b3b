//! Response payload types shared by every front end.
//!
//! Routing is not part of Surveyor; these types only fix the shape of what a
//! router (or the CLI) sends back: a stable error code, its HTTP-style status
//! and a human message.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable, storage-independent error code set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or invalid principal
    Unauthorized,
    /// Principal lacks the role or access grant
    Forbidden,
    /// Entity absent
    NotFound,
    /// Locked, deleted, already locked or duplicate
    Conflict,
    /// Missing or invalid input
    ValidationError,
    /// Storage failure not otherwise classified
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a router should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ValidationError => 400,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Structured error payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.status(),
            message: message.into(),
        }
    }
}
