//! The resolved caller of every core operation.
//!
//! Produced once at the authentication boundary by
//! [`SurveyDb::resolve_principal`](crate::SurveyDb::resolve_principal) and passed
//! by reference into each operation.

use serde::{Deserialize, Serialize};
use surveyor_ids::UserId;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "USER" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DbError::forbidden("Admin role required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_protocol::ErrorCode;

    #[test]
    fn test_require_admin() {
        let admin = Principal::new(UserId::new(1), Role::Admin);
        let user = Principal::new(UserId::new(2), Role::User);
        assert!(admin.require_admin().is_ok());
        let err = user.require_admin().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
