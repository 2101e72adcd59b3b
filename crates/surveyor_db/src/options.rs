//! Answer options and their ordered links to questions.
//!
//! A link row is never duplicated: detaching flags it deleted, attaching the
//! same option again revives it at the end of the question's list.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::info;

use crate::error::{DbError, Result};
use crate::ordering::{self, Direction, Scope};
use crate::principal::Principal;
use crate::questions::require_question;
use crate::surveys::{ensure_mutable, ensure_readable};
use crate::types::*;
use crate::{required_text, SurveyDb};
use surveyor_ids::{LinkId, OptionId, QuestionId, SurveyId};

pub(crate) const OPTION_COLUMNS: &str = "id, value, description, type, is_deleted, survey_id";

pub(crate) fn row_to_option(row: &SqliteRow) -> Result<AnswerOption> {
    let type_raw: String = row.try_get("type")?;
    let option_type = OptionType::parse(&type_raw)
        .ok_or_else(|| DbError::invalid_state(format!("Invalid option type: {}", type_raw)))?;

    Ok(AnswerOption {
        id: OptionId::new(row.try_get("id")?),
        value: row.try_get("value")?,
        description: row.try_get("description")?,
        option_type,
        is_deleted: row.try_get("is_deleted")?,
        survey_id: row
            .try_get::<Option<i64>, _>("survey_id")?
            .map(SurveyId::new),
    })
}

fn row_to_linked(row: &SqliteRow) -> Result<(QuestionId, LinkedOption)> {
    let option = row_to_option(row)?;
    Ok((
        QuestionId::new(row.try_get("question_id")?),
        LinkedOption {
            link_id: LinkId::new(row.try_get("link_id")?),
            index: row.try_get("link_idx")?,
            option,
        },
    ))
}

const LINKED_SELECT: &str = r#"
    SELECT qo.id AS link_id, qo.idx AS link_idx, qo.question_id,
           o.id, o.value, o.description, o.type, o.is_deleted, o.survey_id
    FROM question_option qo
    JOIN options o ON o.id = qo.option_id
"#;

pub(crate) async fn fetch_option(
    conn: &mut SqliteConnection,
    id: OptionId,
) -> Result<Option<AnswerOption>> {
    let sql = format!("SELECT {} FROM options WHERE id = ?", OPTION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_option).transpose()
}

/// Active links of every active question in a survey, grouped by question and
/// ordered by link index.
pub(crate) async fn linked_options_for_survey(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
) -> Result<Vec<(QuestionId, LinkedOption)>> {
    let sql = format!(
        r#"{}
        JOIN questions q ON q.id = qo.question_id
        WHERE q.survey_id = ? AND q.is_deleted = 0 AND qo.is_deleted = 0
        ORDER BY q.idx, qo.idx, qo.id
        "#,
        LINKED_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(survey_id.get())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_linked).collect()
}

/// Active links of one question ordered by index.
pub(crate) async fn active_links(
    conn: &mut SqliteConnection,
    question_id: QuestionId,
) -> Result<Vec<LinkedOption>> {
    let sql = format!(
        "{} WHERE qo.question_id = ? AND qo.is_deleted = 0 ORDER BY qo.idx, qo.id",
        LINKED_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(question_id.get())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| -> Result<LinkedOption> { Ok(row_to_linked(row)?.1) })
        .collect()
}

async fn insert_option(
    conn: &mut SqliteConnection,
    new: &NewOption,
    option_type: OptionType,
    survey_id: Option<SurveyId>,
) -> Result<AnswerOption> {
    let value = required_text(&new.value, "Option value")?;
    let description = required_text(&new.description, "Option description")?;

    let sql = format!(
        "INSERT INTO options (value, description, type, survey_id) VALUES (?, ?, ?, ?) RETURNING {}",
        OPTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&value)
        .bind(&description)
        .bind(option_type.as_str())
        .bind(survey_id.map(SurveyId::get))
        .fetch_one(&mut *conn)
        .await?;

    row_to_option(&row)
}

impl SurveyDb {
    // ========================================================================
    // Option catalog
    // ========================================================================

    pub async fn list_options(
        &self,
        principal: &Principal,
        filter: &OptionFilter,
    ) -> Result<Vec<AnswerOption>> {
        principal.require_admin()?;

        let mut sql = format!("SELECT {} FROM options WHERE 1 = 1", OPTION_COLUMNS);
        if !filter.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if filter.option_type.is_some() {
            sql.push_str(" AND type = ?");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(option_type) = filter.option_type {
            query = query.bind(option_type.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_option).collect()
    }

    /// Live SYSTEM options whose value or description contains `term`.
    pub async fn search_system_options(
        &self,
        principal: &Principal,
        term: &str,
    ) -> Result<Vec<AnswerOption>> {
        principal.require_admin()?;

        let pattern = format!("%{}%", term.trim());
        let sql = format!(
            r#"
            SELECT {} FROM options
            WHERE type = 'SYSTEM' AND is_deleted = 0
              AND (description LIKE ? OR value LIKE ?)
            ORDER BY id
            "#,
            OPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_option).collect()
    }

    pub async fn create_system_option(
        &self,
        principal: &Principal,
        new: NewOption,
    ) -> Result<AnswerOption> {
        principal.require_admin()?;

        let mut conn = self.pool.acquire().await?;
        let option = insert_option(&mut conn, &new, OptionType::System, None).await?;

        info!(option_id = %option.id, "System option created");
        Ok(option)
    }

    pub async fn get_option(&self, principal: &Principal, id: OptionId) -> Result<AnswerOption> {
        principal.require_admin()?;

        let mut conn = self.pool.acquire().await?;
        fetch_option(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Option not found"))
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Attach an option to a question at the end of its list.
    pub async fn attach_option(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
        source: OptionSource,
    ) -> Result<LinkedOption> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;
        require_question(&mut tx, survey_id, question_id).await?;

        let option = match source {
            OptionSource::Existing(option_id) => {
                let option = fetch_option(&mut tx, option_id)
                    .await?
                    .filter(|o| !o.is_deleted)
                    .ok_or_else(|| DbError::not_found("Option not found"))?;
                if option.option_type == OptionType::Custom && option.survey_id != Some(survey_id)
                {
                    return Err(DbError::conflict("Custom option belongs to another survey"));
                }
                option
            }
            OptionSource::NewCustom(new) => {
                insert_option(&mut tx, &new, OptionType::Custom, Some(survey_id)).await?
            }
        };

        let existing: Option<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_deleted FROM question_option WHERE question_id = ? AND option_id = ?",
        )
        .bind(question_id.get())
        .bind(option.id.get())
        .fetch_optional(&mut *tx)
        .await?;

        let index = ordering::insert_at_end(&mut tx, Scope::Links(question_id)).await?;
        let link_id: i64 = match existing {
            Some((_, false)) => {
                return Err(DbError::conflict("Option already attached to question"));
            }
            Some((id, true)) => {
                sqlx::query("UPDATE question_option SET is_deleted = 0, idx = ? WHERE id = ?")
                    .bind(index)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => sqlx::query_scalar(
                "INSERT INTO question_option (question_id, option_id, idx) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(question_id.get())
            .bind(option.id.get())
            .bind(index)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DbError::from(e).reword_conflict("Option already attached to question"))?,
        };

        tx.commit().await?;

        info!(
            question_id = %question_id,
            option_id = %option.id,
            link_id,
            index,
            "Option attached"
        );
        Ok(LinkedOption {
            link_id: LinkId::new(link_id),
            index,
            option,
        })
    }

    pub async fn list_links(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
    ) -> Result<Vec<LinkedOption>> {
        let mut conn = self.pool.acquire().await?;
        ensure_readable(&mut conn, principal, survey_id).await?;
        require_question(&mut conn, survey_id, question_id).await?;
        active_links(&mut conn, question_id).await
    }

    /// Remove a link, closing the index gap.
    pub async fn detach_option(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
        link_id: LinkId,
    ) -> Result<()> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;
        require_question(&mut tx, survey_id, question_id).await?;

        let index =
            ordering::delete_and_compact(&mut tx, Scope::Links(question_id), link_id.get())
                .await?;

        tx.commit().await?;

        info!(question_id = %question_id, link_id = %link_id, index, "Option detached");
        Ok(())
    }

    /// Swap a link with its neighbor. Returns the question's links in their
    /// new order.
    pub async fn move_option(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
        link_id: LinkId,
        direction: Direction,
    ) -> Result<Vec<LinkedOption>> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;
        require_question(&mut tx, survey_id, question_id).await?;

        ordering::swap(&mut tx, Scope::Links(question_id), link_id.get(), direction).await?;
        let links = active_links(&mut tx, question_id).await?;

        tx.commit().await?;

        info!(
            question_id = %question_id,
            link_id = %link_id,
            direction = direction.as_str(),
            "Option moved"
        );
        Ok(links)
    }
}
