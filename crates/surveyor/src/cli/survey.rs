//! Survey command - lifecycle of a survey

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use surveyor_db::SurveyFilter;
use surveyor_ids::SurveyId;

use crate::cli::output::to_json;
use crate::cli::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum SurveyAction {
    /// List surveys
    List {
        /// Include soft-deleted surveys (admin)
        #[arg(long)]
        include_deleted: bool,
    },
    /// Create a survey at version 1
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a survey with its questions and options
    Show { id: SurveyId },
    /// Replace the description of an unlocked survey
    Describe {
        id: SurveyId,
        /// New description; omit to clear it
        #[arg(long)]
        description: Option<String>,
    },
    /// Lock a survey for data collection
    Lock { id: SurveyId },
    /// Clone a locked survey as a new editable version
    Version {
        id: SurveyId,
        #[arg(long)]
        description: Option<String>,
    },
    /// Soft delete a survey and its questions
    Delete { id: SurveyId },
}

pub async fn run(ctx: &Context, action: SurveyAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        SurveyAction::List { include_deleted } => {
            let surveys = ctx
                .db
                .list_surveys(&principal, &SurveyFilter { include_deleted })
                .await?;
            to_json(&surveys)
        }
        SurveyAction::Create { name, description } => {
            let survey = ctx
                .db
                .create_survey(&principal, &name, description.as_deref())
                .await?;
            to_json(&survey)
        }
        SurveyAction::Show { id } => to_json(&ctx.db.get_survey(&principal, id).await?),
        SurveyAction::Describe { id, description } => {
            let survey = ctx
                .db
                .update_survey_description(&principal, id, description.as_deref())
                .await?;
            to_json(&survey)
        }
        SurveyAction::Lock { id } => to_json(&ctx.db.lock_survey(&principal, id).await?),
        SurveyAction::Version { id, description } => {
            let new_id = ctx
                .db
                .create_version(&principal, id, description.as_deref())
                .await?;
            Ok(json!({ "id": new_id, "source_id": id }))
        }
        SurveyAction::Delete { id } => to_json(&ctx.db.delete_survey(&principal, id).await?),
    }
}
