//! Record command - data collection sessions

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use surveyor_db::NewRecord;
use surveyor_ids::{RecordId, SurveyId};

use crate::cli::output::to_json;
use crate::cli::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum RecordAction {
    /// Open a record against a locked survey
    Create {
        survey: SurveyId,
        #[arg(long)]
        subject_name: String,
        #[arg(long)]
        subject_description: String,
    },
    /// List records of a survey
    List { survey: SurveyId },
    /// Show one record
    Show { id: RecordId },
    /// Submit a record once its answers are complete
    Submit { id: RecordId },
    /// Soft delete a record
    Delete { id: RecordId },
}

pub async fn run(ctx: &Context, action: RecordAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        RecordAction::Create {
            survey,
            subject_name,
            subject_description,
        } => {
            let record = ctx
                .db
                .create_record(
                    &principal,
                    survey,
                    NewRecord::new(subject_name, subject_description),
                )
                .await?;
            to_json(&record)
        }
        RecordAction::List { survey } => to_json(&ctx.db.list_records(&principal, survey).await?),
        RecordAction::Show { id } => to_json(&ctx.db.get_record(&principal, id).await?),
        RecordAction::Submit { id } => to_json(&ctx.db.submit_record(&principal, id).await?),
        RecordAction::Delete { id } => {
            ctx.db.delete_record(&principal, id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}
