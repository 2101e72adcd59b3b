//! Survey lifecycle: create, read, describe, lock, soft delete.
//!
//! A survey accepts structural edits only while UNLOCKED and not deleted. Every
//! mutation re-reads the survey inside its own transaction before writing.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use tracing::info;

use crate::access::{grant_is_active, upsert_grant};
use crate::error::{DbError, Result};
use crate::options::linked_options_for_survey;
use crate::principal::Principal;
use crate::questions::active_questions;
use crate::types::*;
use crate::{optional_text, required_text, SurveyDb};
use surveyor_ids::{SurveyId, UserId};

pub(crate) const SURVEY_COLUMNS: &str =
    "id, name, description, version, status, created_at, locked_at, created_by, is_deleted";

pub(crate) fn row_to_survey(row: &SqliteRow) -> Result<Survey> {
    let status_raw: String = row.try_get("status")?;
    let status = SurveyStatus::parse(&status_raw)
        .ok_or_else(|| DbError::invalid_state(format!("Invalid survey status: {}", status_raw)))?;

    Ok(Survey {
        id: SurveyId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        status,
        created_at: SurveyDb::millis_to_datetime(row.try_get("created_at")?),
        locked_at: SurveyDb::opt_millis_to_datetime(row.try_get("locked_at")?),
        created_by: row
            .try_get::<Option<i64>, _>("created_by")?
            .map(UserId::new),
        is_deleted: row.try_get("is_deleted")?,
    })
}

pub(crate) async fn fetch_survey(
    conn: &mut SqliteConnection,
    id: SurveyId,
) -> Result<Option<Survey>> {
    let sql = format!("SELECT {} FROM surveys WHERE id = ?", SURVEY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_survey).transpose()
}

pub(crate) async fn require_survey(conn: &mut SqliteConnection, id: SurveyId) -> Result<Survey> {
    fetch_survey(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Survey not found"))
}

/// Load a survey that accepts structural edits.
pub(crate) async fn ensure_mutable(conn: &mut SqliteConnection, id: SurveyId) -> Result<Survey> {
    let survey = require_survey(conn, id).await?;
    if survey.is_deleted {
        return Err(DbError::conflict("Survey is deleted"));
    }
    if survey.is_locked() {
        return Err(DbError::conflict("Survey is locked"));
    }
    Ok(survey)
}

/// Load a survey the principal may read. Admins see everything, deleted
/// surveys included; respondents need an active grant on a live survey.
pub(crate) async fn ensure_readable(
    conn: &mut SqliteConnection,
    principal: &Principal,
    id: SurveyId,
) -> Result<Survey> {
    let survey = require_survey(conn, id).await?;
    if principal.is_admin() {
        return Ok(survey);
    }
    if survey.is_deleted {
        return Err(DbError::not_found("Survey not found"));
    }
    if !grant_is_active(conn, id, principal.id).await? {
        return Err(DbError::forbidden("No active access to survey"));
    }
    Ok(survey)
}

impl SurveyDb {
    /// List surveys ordered by id.
    ///
    /// Admins see every survey (deleted ones only with `include_deleted`).
    /// Other principals see the live surveys they hold an active grant on.
    pub async fn list_surveys(
        &self,
        principal: &Principal,
        filter: &SurveyFilter,
    ) -> Result<Vec<Survey>> {
        let rows = if principal.is_admin() {
            let sql = if filter.include_deleted {
                format!("SELECT {} FROM surveys ORDER BY id", SURVEY_COLUMNS)
            } else {
                format!(
                    "SELECT {} FROM surveys WHERE is_deleted = 0 ORDER BY id",
                    SURVEY_COLUMNS
                )
            };
            sqlx::query(&sql).fetch_all(&self.pool).await?
        } else {
            if filter.include_deleted {
                principal.require_admin()?;
            }
            let sql = format!(
                "SELECT {} FROM surveys s
                 WHERE s.is_deleted = 0
                   AND EXISTS (SELECT 1 FROM accesses a
                               WHERE a.survey_id = s.id AND a.user_id = ? AND a.is_active = 1)
                 ORDER BY s.id",
                SURVEY_COLUMNS
            );
            sqlx::query(&sql)
                .bind(principal.id.get())
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_survey).collect()
    }

    /// Create a new survey at version 1.
    pub async fn create_survey(
        &self,
        principal: &Principal,
        name: &str,
        description: Option<&str>,
    ) -> Result<Survey> {
        principal.require_admin()?;
        let name = required_text(name, "Survey name")?;
        let description = optional_text(description);

        let mut tx = self.begin_write().await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM surveys WHERE name = ? LIMIT 1")
            .bind(&name)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(DbError::conflict("Survey name exists"));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO surveys (name, description, version, status, created_at, created_by)
            VALUES (?, ?, 1, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(SurveyStatus::Unlocked.as_str())
        .bind(Self::now_millis())
        .bind(principal.id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).reword_conflict("Survey name exists"))?;

        let survey = require_survey(&mut tx, SurveyId::new(id)).await?;
        tx.commit().await?;

        info!(survey_id = %survey.id, name = %survey.name, "Survey created");
        Ok(survey)
    }

    /// Survey with its active questions and their attached options.
    pub async fn get_survey(&self, principal: &Principal, id: SurveyId) -> Result<SurveyTree> {
        let mut conn = self.pool.acquire().await?;
        let survey = ensure_readable(&mut conn, principal, id).await?;

        let questions = active_questions(&mut conn, id).await?;
        let mut options_by_question: HashMap<_, Vec<LinkedOption>> = HashMap::new();
        for (question_id, linked) in linked_options_for_survey(&mut conn, id).await? {
            options_by_question
                .entry(question_id)
                .or_default()
                .push(linked);
        }

        let questions = questions
            .into_iter()
            .map(|question| {
                let options = options_by_question.remove(&question.id).unwrap_or_default();
                QuestionTree { question, options }
            })
            .collect();

        Ok(SurveyTree { survey, questions })
    }

    /// Replace the description of an unlocked survey. Blank clears it.
    pub async fn update_survey_description(
        &self,
        principal: &Principal,
        id: SurveyId,
        description: Option<&str>,
    ) -> Result<Survey> {
        principal.require_admin()?;
        let description = optional_text(description);

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, id).await?;

        sqlx::query("UPDATE surveys SET description = ? WHERE id = ?")
            .bind(&description)
            .bind(id.get())
            .execute(&mut *tx)
            .await?;

        let survey = require_survey(&mut tx, id).await?;
        tx.commit().await?;

        info!(survey_id = %id, "Survey description updated");
        Ok(survey)
    }

    /// Soft delete a survey with its active questions, their links, and its
    /// CUSTOM options. Irreversible.
    pub async fn delete_survey(&self, principal: &Principal, id: SurveyId) -> Result<Survey> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        let survey = require_survey(&mut tx, id).await?;
        if survey.is_deleted {
            return Err(DbError::conflict("Survey already deleted"));
        }

        sqlx::query(
            r#"
            UPDATE question_option SET is_deleted = 1
            WHERE is_deleted = 0
              AND question_id IN (SELECT id FROM questions WHERE survey_id = ? AND is_deleted = 0)
            "#,
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await?;

        let questions = sqlx::query(
            "UPDATE questions SET is_deleted = 1 WHERE survey_id = ? AND is_deleted = 0",
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "UPDATE options SET is_deleted = 1 WHERE survey_id = ? AND type = 'CUSTOM' AND is_deleted = 0",
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE surveys SET is_deleted = 1 WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;

        let survey = require_survey(&mut tx, id).await?;
        tx.commit().await?;

        info!(survey_id = %id, questions, "Survey deleted");
        Ok(survey)
    }

    /// Freeze a survey. One-way; a locked survey can only be versioned.
    pub async fn lock_survey(&self, principal: &Principal, id: SurveyId) -> Result<Survey> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        let survey = require_survey(&mut tx, id).await?;
        if survey.is_locked() {
            return Err(DbError::conflict("Survey already locked"));
        }
        if survey.is_deleted {
            return Err(DbError::conflict("Survey is deleted"));
        }

        sqlx::query("UPDATE surveys SET status = ?, locked_at = ? WHERE id = ?")
            .bind(SurveyStatus::Locked.as_str())
            .bind(Self::now_millis())
            .bind(id.get())
            .execute(&mut *tx)
            .await?;

        if self.options.grant_on_lock {
            upsert_grant(&mut tx, id, principal.id).await?;
        }

        let survey = require_survey(&mut tx, id).await?;
        tx.commit().await?;

        info!(survey_id = %id, version = survey.version, "Survey locked");
        Ok(survey)
    }
}
