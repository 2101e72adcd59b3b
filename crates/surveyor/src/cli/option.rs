//! Option command - the answer option catalog

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use surveyor_db::{NewOption, OptionFilter, OptionType};
use surveyor_ids::OptionId;

use crate::cli::output::to_json;
use crate::cli::Context;

fn parse_option_type(raw: &str) -> Result<OptionType, String> {
    OptionType::parse(raw.trim())
        .ok_or_else(|| format!("Invalid option type '{}': expected SYSTEM or CUSTOM", raw))
}

#[derive(Subcommand, Debug, Clone)]
pub enum OptionAction {
    /// List options
    List {
        #[arg(long)]
        include_deleted: bool,
        #[arg(long = "type", value_parser = parse_option_type)]
        option_type: Option<OptionType>,
    },
    /// Search SYSTEM options by value or description
    Search { term: String },
    /// Create a SYSTEM option shared by all surveys
    Create { value: String, description: String },
    /// Show one option
    Show { id: OptionId },
}

pub async fn run(ctx: &Context, action: OptionAction) -> Result<Value> {
    let principal = ctx.principal().await?;

    match action {
        OptionAction::List {
            include_deleted,
            option_type,
        } => {
            let filter = OptionFilter {
                include_deleted,
                option_type,
            };
            to_json(&ctx.db.list_options(&principal, &filter).await?)
        }
        OptionAction::Search { term } => {
            to_json(&ctx.db.search_system_options(&principal, &term).await?)
        }
        OptionAction::Create { value, description } => {
            let option = ctx
                .db
                .create_system_option(&principal, NewOption { value, description })
                .await?;
            to_json(&option)
        }
        OptionAction::Show { id } => to_json(&ctx.db.get_option(&principal, id).await?),
    }
}
