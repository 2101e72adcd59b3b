//! System configuration shared by the CLI and the database layer.

use std::path::PathBuf;

use crate::defaults::{DEFAULT_GRANT_ON_LOCK, DEFAULT_MAX_CONNECTIONS, DEFAULT_SEAL_ON_SUBMIT};
use crate::paths::default_database_path;

/// Canonical system configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Pool size for file-backed databases
    pub max_connections: u32,
    /// Emails in this domain register as ADMIN
    pub admin_domain: Option<String>,
    /// Explicit ADMIN emails, used only when no admin domain is set
    pub admin_emails: Vec<String>,
    /// Give the locking admin an access grant on the locked survey
    pub grant_on_lock: bool,
    /// Seal a record on submit: no answer edits or second submit afterwards
    pub seal_on_submit: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            admin_domain: None,
            admin_emails: Vec::new(),
            grant_on_lock: DEFAULT_GRANT_ON_LOCK,
            seal_on_submit: DEFAULT_SEAL_ON_SUBMIT,
        }
    }
}

impl SystemConfig {
    /// Split a comma-separated admin email list, dropping blanks.
    pub fn parse_admin_emails(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect()
    }
}
