//! Shared identifier wrappers for Surveyor.
//!
//! Every table uses an INTEGER autoincrement key. The wrappers keep a survey id
//! from being passed where a question id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when parsing a row identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_row_id {
    ($name:ident, $label:expr) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                let raw: i64 = value
                    .trim()
                    .parse()
                    .map_err(|e| IdParseError::new(format!("Invalid {}: {}", $label, e)))?;
                if raw <= 0 {
                    return Err(IdParseError::new(format!(
                        "Invalid {}: must be positive, got {}",
                        $label, raw
                    )));
                }
                Ok(Self(raw))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_row_id!(UserId, "user ID");
define_row_id!(SurveyId, "survey ID");
define_row_id!(QuestionId, "question ID");
define_row_id!(OptionId, "option ID");
define_row_id!(LinkId, "question-option link ID");
define_row_id!(GrantId, "access grant ID");
define_row_id!(RecordId, "record ID");
define_row_id!(AnswerId, "answer ID");
