//! Link command - options attached to a question

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};
use surveyor_db::{DbError, NewOption, OptionSource};
use surveyor_ids::{LinkId, OptionId, QuestionId, SurveyId};

use crate::cli::output::to_json;
use crate::cli::{parse_direction, Context};

#[derive(Subcommand, Debug, Clone)]
pub enum LinkAction {
    /// List the options attached to a question
    List {
        survey: SurveyId,
        question: QuestionId,
    },
    /// Attach an existing option, or create a CUSTOM one with --value/--description
    Attach {
        survey: SurveyId,
        question: QuestionId,
        #[arg(long, conflicts_with_all = ["value", "description"])]
        option: Option<OptionId>,
        #[arg(long, requires = "description")]
        value: Option<String>,
        #[arg(long, requires = "value")]
        description: Option<String>,
    },
    /// Detach an option from a question
    Detach {
        survey: SurveyId,
        question: QuestionId,
        link: LinkId,
    },
    /// Swap a link with its neighbor (UP or DOWN)
    Move {
        survey: SurveyId,
        question: QuestionId,
        link: LinkId,
        /// UP or DOWN
        direction: String,
    },
}

fn option_source(
    option: Option<OptionId>,
    value: Option<String>,
    description: Option<String>,
) -> Result<OptionSource, DbError> {
    match (option, value, description) {
        (Some(id), None, None) => Ok(OptionSource::Existing(id)),
        (None, Some(value), Some(description)) => {
            Ok(OptionSource::NewCustom(NewOption { value, description }))
        }
        _ => Err(DbError::validation(
            "Pass --option, or both --value and --description",
        )),
    }
}

pub async fn run(ctx: &Context, action: LinkAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        LinkAction::List { survey, question } => {
            to_json(&ctx.db.list_links(&principal, survey, question).await?)
        }
        LinkAction::Attach {
            survey,
            question,
            option,
            value,
            description,
        } => {
            let source = option_source(option, value, description)?;
            to_json(
                &ctx.db
                    .attach_option(&principal, survey, question, source)
                    .await?,
            )
        }
        LinkAction::Detach {
            survey,
            question,
            link,
        } => {
            ctx.db
                .detach_option(&principal, survey, question, link)
                .await?;
            Ok(json!({ "detached": link }))
        }
        LinkAction::Move {
            survey,
            question,
            link,
            direction,
        } => to_json(
            &ctx.db
                .move_option(&principal, survey, question, link, parse_direction(&direction)?)
                .await?,
        ),
    }
}
