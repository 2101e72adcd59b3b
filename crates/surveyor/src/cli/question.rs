//! Question command - ordered questions of a survey

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use surveyor_db::{NewQuestion, QuestionPatch, QuestionType};
use surveyor_ids::{QuestionId, SurveyId};

use crate::cli::output::to_json;
use crate::cli::{parse_direction, Context};

fn parse_question_type(raw: &str) -> Result<QuestionType, String> {
    QuestionType::parse(raw.trim())
        .ok_or_else(|| format!("Invalid question type '{}': expected TEXT, RADIO, CHECKBOX or NONE", raw))
}

#[derive(Subcommand, Debug, Clone)]
pub enum QuestionAction {
    /// List the active questions of a survey
    List { survey: SurveyId },
    /// Show one question
    Show {
        survey: SurveyId,
        question: QuestionId,
    },
    /// Append a question
    Add {
        survey: SurveyId,
        description: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "type", value_parser = parse_question_type, default_value = "TEXT")]
        question_type: QuestionType,
        /// Answer may be left empty
        #[arg(long)]
        optional: bool,
        /// Answer accepts attachments
        #[arg(long)]
        attachments: bool,
    },
    /// Change fields of a question
    Update {
        survey: SurveyId,
        question: QuestionId,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        mandatory: Option<bool>,
        #[arg(long = "type", value_parser = parse_question_type)]
        question_type: Option<QuestionType>,
        #[arg(long)]
        attachments: Option<bool>,
    },
    /// Soft delete a question
    Delete {
        survey: SurveyId,
        question: QuestionId,
    },
    /// Swap a question with its neighbor (UP or DOWN)
    Move {
        survey: SurveyId,
        question: QuestionId,
        /// UP or DOWN
        direction: String,
    },
}

pub async fn run(ctx: &Context, action: QuestionAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        QuestionAction::List { survey } => {
            to_json(&ctx.db.list_questions(&principal, survey).await?)
        }
        QuestionAction::Show { survey, question } => {
            to_json(&ctx.db.get_question(&principal, survey, question).await?)
        }
        QuestionAction::Add {
            survey,
            description,
            note,
            question_type,
            optional,
            attachments,
        } => {
            let new = NewQuestion {
                description,
                note,
                mandatory: !optional,
                question_type,
                attachments,
            };
            to_json(&ctx.db.create_question(&principal, survey, new).await?)
        }
        QuestionAction::Update {
            survey,
            question,
            description,
            note,
            mandatory,
            question_type,
            attachments,
        } => {
            let patch = QuestionPatch {
                description,
                note,
                mandatory,
                question_type,
                attachments,
            };
            to_json(
                &ctx.db
                    .update_question(&principal, survey, question, patch)
                    .await?,
            )
        }
        QuestionAction::Delete { survey, question } => {
            ctx.db.delete_question(&principal, survey, question).await?;
            Ok(json!({ "deleted": question }))
        }
        QuestionAction::Move {
            survey,
            question,
            direction,
        } => to_json(
            &ctx.db
                .move_question(&principal, survey, question, parse_direction(&direction)?)
                .await?,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_type() {
        assert_eq!(parse_question_type("radio"), Ok(QuestionType::Radio));
        assert!(parse_question_type("essay").is_err());
    }
}
