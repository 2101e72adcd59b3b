//! Record & answer collection against locked surveys.
//!
//! A record is opened by a granted user, edited through its answers, and
//! submitted once every TEXT and RADIO answer is filled. Writers are re-checked
//! on every call: survey live and locked, caller is the creator, grant active.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{info, warn};

use crate::access::grant_is_active;
use crate::error::{DbError, Result};
use crate::principal::Principal;
use crate::questions::active_questions;
use crate::surveys::require_survey;
use crate::types::*;
use crate::{optional_text, required_text, SurveyDb};
use surveyor_ids::{AnswerId, OptionId, QuestionId, RecordId, SurveyId, UserId};

const RECORD_COLUMNS: &str =
    "id, survey_id, created_by, created_at, locked_at, subject_name, subject_description, is_deleted";

const ANSWER_COLUMNS: &str = "id, record_id, question_id, text, radio, checkbox";

fn row_to_record(row: &SqliteRow) -> Result<Record> {
    Ok(Record {
        id: RecordId::new(row.try_get("id")?),
        survey_id: SurveyId::new(row.try_get("survey_id")?),
        created_by: UserId::new(row.try_get("created_by")?),
        created_at: SurveyDb::millis_to_datetime(row.try_get("created_at")?),
        submitted_at: SurveyDb::opt_millis_to_datetime(row.try_get("locked_at")?),
        subject_name: row.try_get("subject_name")?,
        subject_description: row.try_get("subject_description")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

fn row_to_answer(row: &SqliteRow) -> Result<Answer> {
    let checkbox_json: String = row.try_get("checkbox")?;
    let checkbox: Vec<OptionId> = serde_json::from_str(&checkbox_json)?;

    Ok(Answer {
        id: AnswerId::new(row.try_get("id")?),
        record_id: RecordId::new(row.try_get("record_id")?),
        question_id: QuestionId::new(row.try_get("question_id")?),
        text: row.try_get("text")?,
        radio: row.try_get::<Option<i64>, _>("radio")?.map(OptionId::new),
        checkbox,
    })
}

/// A live record; deleted records read as missing.
async fn require_record(conn: &mut SqliteConnection, id: RecordId) -> Result<Record> {
    let sql = format!(
        "SELECT {} FROM records WHERE id = ? AND is_deleted = 0",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Record not found"))?;

    row_to_record(&row)
}

/// Survey must be live and locked for any record write.
async fn require_collecting_survey(conn: &mut SqliteConnection, id: SurveyId) -> Result<()> {
    let survey = require_survey(conn, id).await?;
    if survey.is_deleted {
        return Err(DbError::conflict("Survey is deleted"));
    }
    if !survey.is_locked() {
        return Err(DbError::conflict("Survey is not locked"));
    }
    Ok(())
}

async fn require_grant(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
    user_id: UserId,
) -> Result<()> {
    if grant_is_active(conn, survey_id, user_id).await? {
        Ok(())
    } else {
        Err(DbError::forbidden("No active access to survey"))
    }
}

/// Load a record the principal may write: creator, active grant, survey still
/// live and locked.
async fn require_writable_record(
    conn: &mut SqliteConnection,
    principal: &Principal,
    id: RecordId,
) -> Result<Record> {
    let record = require_record(conn, id).await?;
    require_collecting_survey(conn, record.survey_id).await?;
    if record.created_by != principal.id {
        return Err(DbError::forbidden("Record belongs to another user"));
    }
    require_grant(conn, record.survey_id, principal.id).await?;
    Ok(record)
}

/// Load a record the principal may read: any admin, or the creator while the
/// grant is active.
async fn require_visible_record(
    conn: &mut SqliteConnection,
    principal: &Principal,
    id: RecordId,
) -> Result<Record> {
    let record = require_record(conn, id).await?;
    if principal.is_admin() {
        return Ok(record);
    }
    if record.created_by != principal.id {
        return Err(DbError::forbidden("Record belongs to another user"));
    }
    require_grant(conn, record.survey_id, principal.id).await?;
    Ok(record)
}

async fn require_linked(
    conn: &mut SqliteConnection,
    question_id: QuestionId,
    option_id: OptionId,
) -> Result<()> {
    let linked: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM question_option WHERE question_id = ? AND option_id = ? AND is_deleted = 0",
    )
    .bind(question_id.get())
    .bind(option_id.get())
    .fetch_optional(&mut *conn)
    .await?;

    if linked.is_none() {
        return Err(DbError::validation(format!(
            "Option {} is not attached to question {}",
            option_id, question_id
        )));
    }
    Ok(())
}

/// Answers that still block submission. CHECKBOX answers and the mandatory
/// flag do not count.
async fn count_incomplete(conn: &mut SqliteConnection, record_id: RecordId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE a.record_id = ?
          AND ((q.type = 'TEXT' AND a.text IS NULL)
            OR (q.type = 'RADIO' AND a.radio IS NULL))
        "#,
    )
    .bind(record_id.get())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

impl SurveyDb {
    /// Open a record against a locked survey, with one blank answer per
    /// active question.
    pub async fn create_record(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        new: NewRecord,
    ) -> Result<Record> {
        let mut tx = self.begin_write().await?;

        require_collecting_survey(&mut tx, survey_id).await?;
        require_grant(&mut tx, survey_id, principal.id).await?;

        let subject_name = required_text(&new.subject_name, "Subject name")?;
        let subject_description = required_text(&new.subject_description, "Subject description")?;

        let sql = format!(
            r#"
            INSERT INTO records (survey_id, created_by, created_at, subject_name, subject_description)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(survey_id.get())
            .bind(principal.id.get())
            .bind(Self::now_millis())
            .bind(&subject_name)
            .bind(&subject_description)
            .fetch_one(&mut *tx)
            .await?;
        let record = row_to_record(&row)?;

        let questions = active_questions(&mut tx, survey_id).await?;
        for question in &questions {
            sqlx::query("INSERT INTO answers (record_id, question_id) VALUES (?, ?)")
                .bind(record.id.get())
                .bind(question.id.get())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            survey_id = %survey_id,
            record_id = %record.id,
            answers = questions.len(),
            "Record created"
        );
        Ok(record)
    }

    /// Replace the response fields of one answer.
    pub async fn update_answer(
        &self,
        principal: &Principal,
        record_id: RecordId,
        question_id: QuestionId,
        answer_id: AnswerId,
        update: AnswerUpdate,
    ) -> Result<Answer> {
        let mut tx = self.begin_write().await?;

        let record = require_writable_record(&mut tx, principal, record_id).await?;
        if self.options.seal_on_submit && record.is_submitted() {
            return Err(DbError::conflict("Record already submitted"));
        }

        let sql = format!(
            "SELECT {} FROM answers WHERE id = ? AND record_id = ? AND question_id = ?",
            ANSWER_COLUMNS
        );
        let exists = sqlx::query(&sql)
            .bind(answer_id.get())
            .bind(record_id.get())
            .bind(question_id.get())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Answer not found"));
        }

        if let Some(radio) = update.radio {
            require_linked(&mut tx, question_id, radio).await?;
        }
        for option_id in &update.checkbox {
            require_linked(&mut tx, question_id, *option_id).await?;
        }

        // Blank text counts as unanswered
        let text = optional_text(update.text.as_deref());
        let checkbox_json = serde_json::to_string(&update.checkbox)?;
        let sql = format!(
            "UPDATE answers SET text = ?, radio = ?, checkbox = ? WHERE id = ? RETURNING {}",
            ANSWER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&text)
            .bind(update.radio.map(OptionId::get))
            .bind(&checkbox_json)
            .bind(answer_id.get())
            .fetch_one(&mut *tx)
            .await?;
        let answer = row_to_answer(&row)?;

        tx.commit().await?;

        info!(record_id = %record_id, answer_id = %answer_id, "Answer updated");
        Ok(answer)
    }

    /// Stamp the record submitted once no TEXT or RADIO answer is empty.
    pub async fn submit_record(&self, principal: &Principal, record_id: RecordId) -> Result<Record> {
        let mut tx = self.begin_write().await?;

        let record = require_writable_record(&mut tx, principal, record_id).await?;
        if record.is_submitted() {
            if self.options.seal_on_submit {
                return Err(DbError::conflict("Record already submitted"));
            }
            warn!(record_id = %record_id, "Record resubmitted");
        }

        let missing = count_incomplete(&mut tx, record_id).await?;
        if missing != 0 {
            return Err(DbError::validation(format!(
                "Record has {} unanswered question(s)",
                missing
            )));
        }

        sqlx::query("UPDATE records SET locked_at = ? WHERE id = ?")
            .bind(Self::now_millis())
            .bind(record_id.get())
            .execute(&mut *tx)
            .await?;

        let record = require_record(&mut tx, record_id).await?;
        tx.commit().await?;

        info!(record_id = %record_id, survey_id = %record.survey_id, "Record submitted");
        Ok(record)
    }

    /// Records of a survey. Admins see all of them; respondents need an active
    /// grant and see their own.
    pub async fn list_records(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
    ) -> Result<Vec<Record>> {
        let mut conn = self.pool.acquire().await?;
        require_survey(&mut conn, survey_id).await?;

        let rows = if principal.is_admin() {
            let sql = format!(
                "SELECT {} FROM records WHERE survey_id = ? AND is_deleted = 0 ORDER BY id",
                RECORD_COLUMNS
            );
            sqlx::query(&sql)
                .bind(survey_id.get())
                .fetch_all(&mut *conn)
                .await?
        } else {
            require_grant(&mut conn, survey_id, principal.id).await?;
            let sql = format!(
                "SELECT {} FROM records WHERE survey_id = ? AND created_by = ? AND is_deleted = 0 ORDER BY id",
                RECORD_COLUMNS
            );
            sqlx::query(&sql)
                .bind(survey_id.get())
                .bind(principal.id.get())
                .fetch_all(&mut *conn)
                .await?
        };

        rows.iter().map(row_to_record).collect()
    }

    pub async fn get_record(&self, principal: &Principal, record_id: RecordId) -> Result<Record> {
        let mut conn = self.pool.acquire().await?;
        require_visible_record(&mut conn, principal, record_id).await
    }

    /// Answers of a record in question order.
    pub async fn list_answers(
        &self,
        principal: &Principal,
        record_id: RecordId,
    ) -> Result<Vec<Answer>> {
        let mut conn = self.pool.acquire().await?;
        require_visible_record(&mut conn, principal, record_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT a.id, a.record_id, a.question_id, a.text, a.radio, a.checkbox
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.record_id = ?
            ORDER BY q.idx, a.id
            "#,
        )
        .bind(record_id.get())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_answer).collect()
    }

    /// Soft delete a record. Admins and the creator only.
    pub async fn delete_record(&self, principal: &Principal, record_id: RecordId) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let record = require_record(&mut tx, record_id).await?;
        if !principal.is_admin() && record.created_by != principal.id {
            return Err(DbError::forbidden("Record belongs to another user"));
        }

        sqlx::query("UPDATE records SET is_deleted = 1 WHERE id = ?")
            .bind(record_id.get())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(record_id = %record_id, "Record deleted");
        Ok(())
    }
}

impl NewRecord {
    pub fn new(subject_name: impl Into<String>, subject_description: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_description: subject_description.into(),
        }
    }
}

impl AnswerUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn radio(option_id: OptionId) -> Self {
        Self {
            radio: Some(option_id),
            ..Self::default()
        }
    }

    pub fn checkbox(option_ids: Vec<OptionId>) -> Self {
        Self {
            checkbox: option_ids,
            ..Self::default()
        }
    }
}
