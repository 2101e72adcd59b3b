//! Grant command - survey access for respondents

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use surveyor_ids::{SurveyId, UserId};

use crate::cli::output::to_json;
use crate::cli::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum GrantAction {
    /// Grant a user access to a survey (reactivates a revoked grant)
    Add { survey: SurveyId, user: UserId },
    /// Revoke a user's access
    Revoke { survey: SurveyId, user: UserId },
    /// Check whether a user's access is active
    Check { survey: SurveyId, user: UserId },
    /// List all grants of a survey
    List { survey: SurveyId },
}

pub async fn run(ctx: &Context, action: GrantAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        GrantAction::Add { survey, user } => {
            to_json(&ctx.db.grant_access(&principal, survey, user).await?)
        }
        GrantAction::Revoke { survey, user } => {
            to_json(&ctx.db.revoke_access(&principal, survey, user).await?)
        }
        GrantAction::Check { survey, user } => {
            let active = ctx.db.is_access_active(&principal, survey, user).await?;
            Ok(json!({ "survey_id": survey, "user_id": user, "is_active": active }))
        }
        GrantAction::List { survey } => to_json(&ctx.db.list_grants(&principal, survey).await?),
    }
}
