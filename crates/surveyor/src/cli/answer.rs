//! Answer command - responses inside a record

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use surveyor_db::AnswerUpdate;
use surveyor_ids::{AnswerId, OptionId, QuestionId, RecordId};

use crate::cli::output::to_json;
use crate::cli::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum AnswerAction {
    /// List the answers of a record in question order
    List { record: RecordId },
    /// Replace an answer's response fields
    Set {
        record: RecordId,
        question: QuestionId,
        answer: AnswerId,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        radio: Option<OptionId>,
        /// Selected option ids, comma-separated
        #[arg(long, value_delimiter = ',')]
        checkbox: Vec<OptionId>,
    },
}

pub async fn run(ctx: &Context, action: AnswerAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        AnswerAction::List { record } => to_json(&ctx.db.list_answers(&principal, record).await?),
        AnswerAction::Set {
            record,
            question,
            answer,
            text,
            radio,
            checkbox,
        } => {
            let update = AnswerUpdate {
                text,
                radio,
                checkbox,
            };
            to_json(
                &ctx.db
                    .update_answer(&principal, record, question, answer, update)
                    .await?,
            )
        }
    }
}
