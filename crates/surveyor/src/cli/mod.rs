//! Command tree for the `surveyor` binary.
//!
//! One module per command group. Each exposes a `clap` subcommand enum and an
//! async `run` that returns the JSON payload to print.

pub mod answer;
pub mod grant;
pub mod link;
pub mod option;
pub mod output;
pub mod question;
pub mod record;
pub mod survey;
pub mod user;

use anyhow::Result;
use surveyor_db::{
    DbConfig, DbError, DbOptions, Direction, Principal, RegistrationPolicy, SurveyDb,
};
use surveyor_ids::UserId;
use surveyor_protocol::SystemConfig;
use tracing::debug;

/// Open database plus the settings a command may need.
pub struct Context {
    pub db: SurveyDb,
    pub config: SystemConfig,
    as_user: Option<UserId>,
}

impl Context {
    pub async fn open(config: SystemConfig, as_user: Option<UserId>) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_config =
            DbConfig::sqlite(&config.database_path).with_max_connections(config.max_connections);
        let db = SurveyDb::connect(db_config).await?.with_options(DbOptions {
            grant_on_lock: config.grant_on_lock,
            seal_on_submit: config.seal_on_submit,
        });

        debug!(path = %config.database_path.display(), "Database ready");
        Ok(Self {
            db,
            config,
            as_user,
        })
    }

    /// Resolve `--as-user` into a principal.
    pub async fn principal(&self) -> Result<Principal> {
        let id = self.as_user.ok_or_else(|| {
            DbError::unauthorized("No user given; pass --as-user or set SURVEYOR_USER")
        })?;
        Ok(self.db.resolve_principal(id).await?)
    }

    pub fn registration_policy(&self) -> RegistrationPolicy {
        RegistrationPolicy::from_config(&self.config)
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

/// Parse a reorder direction after clap, so a bad value reports as
/// VALIDATION_ERROR in the JSON error payload.
pub fn parse_direction(raw: &str) -> std::result::Result<Direction, DbError> {
    Ok(Direction::parse(raw)?)
}
