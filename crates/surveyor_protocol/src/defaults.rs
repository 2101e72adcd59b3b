//! Canonical default values shared by the CLI and the database layer.

pub const DEFAULT_DATABASE_FILE: &str = "surveyor.sqlite3";
pub const DEFAULT_LOG_FILTER: &str = "surveyor=info,surveyor_db=info";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_GRANT_ON_LOCK: bool = false;
pub const DEFAULT_SEAL_ON_SUBMIT: bool = false;
pub const HOME_ENV_VAR: &str = "SURVEYOR_HOME";
