//! User command - registration and lookup

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use surveyor_db::{DbError, NewUser};
use surveyor_ids::UserId;

use crate::cli::output::to_json;
use crate::cli::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum UserAction {
    /// Register a new user (no --as-user needed)
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: String,
    },
    /// Show one user by id or by --email
    Show {
        #[arg(required_unless_present = "email")]
        id: Option<UserId>,
        #[arg(long, conflicts_with = "id")]
        email: Option<String>,
    },
    /// Show the user running the command
    Whoami,
    /// List all users (admin)
    List,
}

pub async fn run(ctx: &Context, action: UserAction) -> Result<Value> {
    match action {
        UserAction::Register {
            first_name,
            last_name,
            email,
        } => {
            let user = ctx
                .db
                .register_user(
                    NewUser {
                        first_name,
                        last_name,
                        email,
                    },
                    &ctx.registration_policy(),
                )
                .await?;
            to_json(&user)
        }
        UserAction::Show { id, email } => {
            let principal = ctx.principal().await?;
            let user = match (id, email) {
                (Some(id), _) => ctx.db.get_user(id).await?,
                (None, Some(email)) => ctx.db.find_user_by_email(&email).await?,
                (None, None) => return Err(DbError::validation("Pass a user id or --email").into()),
            };

            // Users may look themselves up; anyone else needs ADMIN
            let is_self = match &user {
                Some(user) => user.id == principal.id,
                None => id == Some(principal.id),
            };
            if !is_self {
                principal.require_admin()?;
            }
            to_json(&user.ok_or_else(|| DbError::not_found("User not found"))?)
        }
        UserAction::Whoami => {
            let principal = ctx.principal().await?;
            to_json(&principal)
        }
        UserAction::List => {
            let principal = ctx.principal().await?;
            to_json(&ctx.db.list_users(&principal).await?)
        }
    }
}
