//! Surveyor command-line front end
//!
//! Every command resolves the caller (`--as-user`), runs one core operation and
//! prints its result as JSON on stdout. Failures print an error payload
//! `{ "code", "status", "message" }` and exit with status 1.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use surveyor_ids::UserId;
use surveyor_logging::{init_logging, LogConfig};
use surveyor_protocol::paths::default_database_path;
use surveyor_protocol::SystemConfig;

mod cli;

use cli::{
    answer::AnswerAction, grant::GrantAction, link::LinkAction, option::OptionAction,
    question::QuestionAction, record::RecordAction, survey::SurveyAction, user::UserAction,
};

#[derive(Parser, Debug)]
#[command(
    name = "surveyor",
    version,
    about = "Versioned survey administration and data collection"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// SQLite database file (defaults to ~/.surveyor/surveyor.sqlite3)
    #[arg(long, global = true, env = "SURVEYOR_DATABASE")]
    database: Option<PathBuf>,

    /// Id of the user running the command
    #[arg(long = "as-user", global = true, env = "SURVEYOR_USER")]
    as_user: Option<UserId>,

    /// Emails in this domain register as ADMIN
    #[arg(long, global = true, env = "SURVEYOR_ADMIN_DOMAIN")]
    admin_domain: Option<String>,

    /// Comma-separated ADMIN emails (used when no admin domain is set)
    #[arg(long, global = true, env = "SURVEYOR_ADMIN_EMAILS")]
    admin_emails: Option<String>,

    /// Give the locking admin an access grant on the locked survey
    #[arg(long, global = true)]
    grant_on_lock: bool,

    /// Reject answer edits and a second submit once a record is submitted
    #[arg(long, global = true)]
    seal_on_submit: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register and inspect users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Create, lock, version and delete surveys
    Survey {
        #[command(subcommand)]
        action: SurveyAction,
    },

    /// Manage the ordered questions of a survey
    Question {
        #[command(subcommand)]
        action: QuestionAction,
    },

    /// Manage the answer option catalog
    #[command(name = "option")]
    Options {
        #[command(subcommand)]
        action: OptionAction,
    },

    /// Attach, detach and reorder the options of a question
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Grant or revoke survey access
    Grant {
        #[command(subcommand)]
        action: GrantAction,
    },

    /// Open, submit and inspect records
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },

    /// Read and edit the answers of a record
    Answer {
        #[command(subcommand)]
        action: AnswerAction,
    },
}

fn system_config(cli: &Cli) -> SystemConfig {
    SystemConfig {
        database_path: cli.database.clone().unwrap_or_else(default_database_path),
        admin_domain: cli
            .admin_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        admin_emails: cli
            .admin_emails
            .as_deref()
            .map(SystemConfig::parse_admin_emails)
            .unwrap_or_default(),
        grant_on_lock: cli.grant_on_lock,
        seal_on_submit: cli.seal_on_submit,
        ..SystemConfig::default()
    }
}

async fn run_command(cli: Cli) -> Result<Value> {
    let config = system_config(&cli);
    let ctx = cli::Context::open(config, cli.as_user).await?;

    let result = match cli.command {
        Commands::User { action } => cli::user::run(&ctx, action).await,
        Commands::Survey { action } => cli::survey::run(&ctx, action).await,
        Commands::Question { action } => cli::question::run(&ctx, action).await,
        Commands::Options { action } => cli::option::run(&ctx, action).await,
        Commands::Link { action } => cli::link::run(&ctx, action).await,
        Commands::Grant { action } => cli::grant::run(&ctx, action).await,
        Commands::Record { action } => cli::record::run(&ctx, action).await,
        Commands::Answer { action } => cli::answer::run(&ctx, action).await,
    };

    ctx.close().await;
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "surveyor",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: {:#}", err);
    }

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run_command(cli)));

    match result {
        Ok(value) => {
            cli::output::print_json(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            cli::output::print_error(&err);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "surveyor",
            "survey",
            "lock",
            "3",
            "--as-user",
            "1",
            "--grant-on-lock",
        ])
        .unwrap();
        assert_eq!(cli.as_user, Some(UserId::new(1)));
        assert!(cli.grant_on_lock);
        assert!(matches!(
            cli.command,
            Commands::Survey {
                action: SurveyAction::Lock { .. }
            }
        ));
    }

    #[test]
    fn test_admin_settings_collect_into_config() {
        let cli = Cli::try_parse_from([
            "surveyor",
            "--database",
            "/tmp/census.sqlite3",
            "--admin-emails",
            "a@x.org, b@y.org",
            "user",
            "list",
        ])
        .unwrap();
        let config = system_config(&cli);
        assert_eq!(config.database_path, PathBuf::from("/tmp/census.sqlite3"));
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.admin_domain.is_none());
        assert!(!config.seal_on_submit);
    }

    #[test]
    fn test_bad_direction_reaches_the_handler() {
        let cli = Cli::try_parse_from(["surveyor", "question", "move", "1", "2", "sideways"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Question {
                action: QuestionAction::Move { ref direction, .. }
            } if direction == "sideways"
        ));
    }
}
