//! Clone a locked survey into a new, editable version.
//!
//! The copy shares the source's name at `max(version) + 1`. Questions keep
//! their indices; CUSTOM options are duplicated and relinked; SYSTEM options
//! are linked by their original id.

use std::collections::HashMap;
use tracing::info;

use crate::error::{DbError, Result};
use crate::principal::Principal;
use crate::questions::active_questions;
use crate::surveys::require_survey;
use crate::types::SurveyStatus;
use crate::{optional_text, SurveyDb};
use surveyor_ids::SurveyId;

/// Description used when none (or the default itself) is requested.
fn default_version_description(version: i64, source: Option<&str>) -> String {
    format!("Version {}: {}", version, source.unwrap_or_default().trim())
}

fn resolve_description(version: i64, source: Option<&str>, requested: Option<&str>) -> String {
    let default = default_version_description(version, source);
    match optional_text(requested) {
        Some(requested) if requested != default => requested,
        _ => default,
    }
}

impl SurveyDb {
    /// Clone `source_id` as a new UNLOCKED version. Returns the new survey id.
    pub async fn create_version(
        &self,
        principal: &Principal,
        source_id: SurveyId,
        description: Option<&str>,
    ) -> Result<SurveyId> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;

        let source = require_survey(&mut tx, source_id).await?;
        if !source.is_locked() {
            return Err(DbError::conflict("Only locked surveys can be versioned"));
        }

        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM surveys WHERE name = ?")
                .bind(&source.name)
                .fetch_one(&mut *tx)
                .await?;
        let version = latest.unwrap_or(source.version) + 1;
        let description = resolve_description(version, source.description.as_deref(), description);

        let new_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO surveys (name, description, version, status, created_at, created_by)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&source.name)
        .bind(&description)
        .bind(version)
        .bind(SurveyStatus::Unlocked.as_str())
        .bind(Self::now_millis())
        .bind(principal.id.get())
        .fetch_one(&mut *tx)
        .await?;

        let mut question_map: HashMap<i64, i64> = HashMap::new();
        for question in active_questions(&mut tx, source_id).await? {
            let copied: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (survey_id, description, note, mandatory, type, attachments, created_at, idx)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(new_id)
            .bind(&question.description)
            .bind(&question.note)
            .bind(question.mandatory)
            .bind(question.question_type.as_str())
            .bind(question.attachments)
            .bind(Self::now_millis())
            .bind(question.index)
            .fetch_one(&mut *tx)
            .await?;
            question_map.insert(question.id.get(), copied);
        }

        let custom_options: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, value, description FROM options
            WHERE survey_id = ? AND type = 'CUSTOM' AND is_deleted = 0
            ORDER BY id
            "#,
        )
        .bind(source_id.get())
        .fetch_all(&mut *tx)
        .await?;

        let mut option_map: HashMap<i64, i64> = HashMap::new();
        for (old_id, value, option_description) in custom_options {
            let copied: i64 = sqlx::query_scalar(
                "INSERT INTO options (value, description, type, survey_id) VALUES (?, ?, 'CUSTOM', ?) RETURNING id",
            )
            .bind(&value)
            .bind(&option_description)
            .bind(new_id)
            .fetch_one(&mut *tx)
            .await?;
            option_map.insert(old_id, copied);
        }

        let links: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT qo.question_id, qo.option_id, qo.idx
            FROM question_option qo
            JOIN questions q ON q.id = qo.question_id
            WHERE q.survey_id = ? AND q.is_deleted = 0 AND qo.is_deleted = 0
            ORDER BY qo.question_id, qo.idx
            "#,
        )
        .bind(source_id.get())
        .fetch_all(&mut *tx)
        .await?;

        for (question_id, option_id, index) in &links {
            let question_id = *question_map.get(question_id).ok_or_else(|| {
                DbError::invalid_state(format!("Link to uncopied question {}", question_id))
            })?;
            let option_id = *option_map.get(option_id).unwrap_or(option_id);

            sqlx::query("INSERT INTO question_option (question_id, option_id, idx) VALUES (?, ?, ?)")
                .bind(question_id)
                .bind(option_id)
                .bind(*index)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let new_id = SurveyId::new(new_id);
        info!(
            source_id = %source_id,
            survey_id = %new_id,
            version,
            questions = question_map.len(),
            custom_options = option_map.len(),
            links = links.len(),
            "Survey versioned"
        );
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_description_trims_source() {
        assert_eq!(
            default_version_description(2, Some("  Household census ")),
            "Version 2: Household census"
        );
        assert_eq!(default_version_description(3, None), "Version 3: ");
    }

    #[test]
    fn test_requested_description_wins_unless_blank_or_default() {
        assert_eq!(
            resolve_description(2, Some("Census"), Some(" Revised wording ")),
            "Revised wording"
        );
        assert_eq!(
            resolve_description(2, Some("Census"), Some("   ")),
            "Version 2: Census"
        );
        assert_eq!(
            resolve_description(2, Some("Census"), Some("Version 2: Census")),
            "Version 2: Census"
        );
        assert_eq!(resolve_description(2, Some("Census"), None), "Version 2: Census");
    }
}
