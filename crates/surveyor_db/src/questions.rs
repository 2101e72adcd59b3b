//! Question operations. Indices come from the ordering engine.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::info;

use crate::error::{DbError, Result};
use crate::ordering::{self, Direction, Scope};
use crate::principal::Principal;
use crate::surveys::{ensure_mutable, ensure_readable};
use crate::types::*;
use crate::{optional_text, required_text, SurveyDb};
use surveyor_ids::{QuestionId, SurveyId};

pub(crate) const QUESTION_COLUMNS: &str =
    "id, survey_id, description, note, mandatory, type, attachments, is_deleted, created_at, idx";

pub(crate) fn row_to_question(row: &SqliteRow) -> Result<Question> {
    let type_raw: String = row.try_get("type")?;
    let question_type = QuestionType::parse(&type_raw)
        .ok_or_else(|| DbError::invalid_state(format!("Invalid question type: {}", type_raw)))?;

    Ok(Question {
        id: QuestionId::new(row.try_get("id")?),
        survey_id: SurveyId::new(row.try_get("survey_id")?),
        description: row.try_get("description")?,
        note: row.try_get("note")?,
        mandatory: row.try_get("mandatory")?,
        question_type,
        attachments: row.try_get("attachments")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: SurveyDb::millis_to_datetime(row.try_get("created_at")?),
        index: row.try_get("idx")?,
    })
}

/// Active questions of a survey ordered by index.
pub(crate) async fn active_questions(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
) -> Result<Vec<Question>> {
    let sql = format!(
        "SELECT {} FROM questions WHERE survey_id = ? AND is_deleted = 0 ORDER BY idx, id",
        QUESTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(survey_id.get())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_question).collect()
}

/// An active question that belongs to `survey_id`.
pub(crate) async fn require_question(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
    question_id: QuestionId,
) -> Result<Question> {
    let sql = format!(
        "SELECT {} FROM questions WHERE id = ? AND survey_id = ? AND is_deleted = 0",
        QUESTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(question_id.get())
        .bind(survey_id.get())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Question not found"))?;

    row_to_question(&row)
}

impl SurveyDb {
    /// Append a question to an unlocked survey.
    pub async fn create_question(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        new: NewQuestion,
    ) -> Result<Question> {
        principal.require_admin()?;
        let description = required_text(&new.description, "Question description")?;
        let note = optional_text(new.note.as_deref());

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;

        let index = ordering::insert_at_end(&mut tx, Scope::Questions(survey_id)).await?;

        let sql = format!(
            r#"
            INSERT INTO questions (survey_id, description, note, mandatory, type, attachments, created_at, idx)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(survey_id.get())
            .bind(&description)
            .bind(&note)
            .bind(new.mandatory)
            .bind(new.question_type.as_str())
            .bind(new.attachments)
            .bind(Self::now_millis())
            .bind(index)
            .fetch_one(&mut *tx)
            .await?;
        let question = row_to_question(&row)?;

        tx.commit().await?;

        info!(survey_id = %survey_id, question_id = %question.id, index, "Question created");
        Ok(question)
    }

    pub async fn list_questions(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
    ) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        ensure_readable(&mut conn, principal, survey_id).await?;
        active_questions(&mut conn, survey_id).await
    }

    pub async fn get_question(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
    ) -> Result<Question> {
        let mut conn = self.pool.acquire().await?;
        ensure_readable(&mut conn, principal, survey_id).await?;
        require_question(&mut conn, survey_id, question_id).await
    }

    /// Apply a partial update. An empty patch returns the question unchanged.
    pub async fn update_question(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
        patch: QuestionPatch,
    ) -> Result<Question> {
        principal.require_admin()?;
        let description = patch
            .description
            .as_deref()
            .map(|d| required_text(d, "Question description"))
            .transpose()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;
        let current = require_question(&mut tx, survey_id, question_id).await?;

        if patch.is_empty() {
            return Ok(current);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
        let mut fields = builder.separated(", ");
        if let Some(description) = description {
            fields.push("description = ").push_bind_unseparated(description);
        }
        if let Some(note) = patch.note.as_deref() {
            fields.push("note = ").push_bind_unseparated(optional_text(Some(note)));
        }
        if let Some(mandatory) = patch.mandatory {
            fields.push("mandatory = ").push_bind_unseparated(mandatory);
        }
        if let Some(question_type) = patch.question_type {
            fields
                .push("type = ")
                .push_bind_unseparated(question_type.as_str());
        }
        if let Some(attachments) = patch.attachments {
            fields
                .push("attachments = ")
                .push_bind_unseparated(attachments);
        }
        builder.push(" WHERE id = ").push_bind(question_id.get());
        builder.build().execute(&mut *tx).await?;

        let question = require_question(&mut tx, survey_id, question_id).await?;
        tx.commit().await?;

        info!(survey_id = %survey_id, question_id = %question_id, "Question updated");
        Ok(question)
    }

    /// Soft delete a question with its links, closing the index gap.
    pub async fn delete_question(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
    ) -> Result<()> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;

        let index =
            ordering::delete_and_compact(&mut tx, Scope::Questions(survey_id), question_id.get())
                .await?;

        sqlx::query("UPDATE question_option SET is_deleted = 1 WHERE question_id = ? AND is_deleted = 0")
            .bind(question_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(survey_id = %survey_id, question_id = %question_id, index, "Question deleted");
        Ok(())
    }

    /// Swap a question with its neighbor. Returns the survey's questions in
    /// their new order.
    pub async fn move_question(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        question_id: QuestionId,
        direction: Direction,
    ) -> Result<Vec<Question>> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        ensure_mutable(&mut tx, survey_id).await?;

        let plan = ordering::swap(
            &mut tx,
            Scope::Questions(survey_id),
            question_id.get(),
            direction,
        )
        .await?;
        let questions = active_questions(&mut tx, survey_id).await?;

        tx.commit().await?;

        info!(
            survey_id = %survey_id,
            question_id = %question_id,
            direction = direction.as_str(),
            from = plan.item.index,
            to = plan.neighbor.index,
            "Question moved"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::OrderingError;
    use crate::users::tests::insert_user;
    use crate::Role;

    async fn setup() -> (SurveyDb, Principal, SurveyId) {
        let db = SurveyDb::open_memory().await.unwrap();
        let admin = Principal::new(
            insert_user(&db, "admin@example.org", Role::Admin).await,
            Role::Admin,
        );
        let survey = db.create_survey(&admin, "Census", None).await.unwrap();
        (db, admin, survey.id)
    }

    async fn add(db: &SurveyDb, admin: &Principal, survey: SurveyId, text: &str) -> Question {
        db.create_question(admin, survey, NewQuestion::new(text))
            .await
            .unwrap()
    }

    fn indices(questions: &[Question]) -> Vec<(String, i64)> {
        questions
            .iter()
            .map(|q| (q.description.clone(), q.index))
            .collect()
    }

    #[tokio::test]
    async fn test_create_appends_with_defaults() {
        let (db, admin, survey) = setup().await;
        let q1 = add(&db, &admin, survey, "Name").await;
        let q2 = db
            .create_question(
                &admin,
                survey,
                NewQuestion::new("Colour")
                    .with_type(QuestionType::Radio)
                    .with_note("Pick one"),
            )
            .await
            .unwrap();

        assert_eq!(q1.index, 1);
        assert!(q1.mandatory);
        assert_eq!(q1.question_type, QuestionType::Text);
        assert_eq!(q2.index, 2);
        assert_eq!(q2.note.as_deref(), Some("Pick one"));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_description() {
        let (db, admin, survey) = setup().await;
        let err = db
            .create_question(&admin, survey, NewQuestion::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_up_then_first_up_fails() {
        let (db, admin, survey) = setup().await;
        let q1 = add(&db, &admin, survey, "Q1").await;
        let q2 = add(&db, &admin, survey, "Q2").await;

        let moved = db
            .move_question(&admin, survey, q2.id, Direction::Up)
            .await
            .unwrap();
        assert_eq!(
            indices(&moved),
            vec![("Q2".to_string(), 1), ("Q1".to_string(), 2)]
        );

        let err = db
            .move_question(&admin, survey, q2.id, Direction::Up)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ordering(OrderingError::NoAdjacentItem(0))
        ));

        let err = db
            .move_question(&admin, survey, q1.id, Direction::Down)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ordering(OrderingError::OutOfRange { index: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_compacts_later_siblings() {
        let (db, admin, survey) = setup().await;
        add(&db, &admin, survey, "Q1").await;
        let q2 = add(&db, &admin, survey, "Q2").await;
        add(&db, &admin, survey, "Q3").await;

        db.delete_question(&admin, survey, q2.id).await.unwrap();

        let left = db.list_questions(&admin, survey).await.unwrap();
        assert_eq!(
            indices(&left),
            vec![("Q1".to_string(), 1), ("Q3".to_string(), 2)]
        );

        let err = db.get_question(&admin, survey, q2.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));

        let q4 = add(&db, &admin, survey, "Q4").await;
        assert_eq!(q4.index, 3);
    }

    #[tokio::test]
    async fn test_question_must_belong_to_survey() {
        let (db, admin, survey) = setup().await;
        let other = db.create_survey(&admin, "Inventory", None).await.unwrap();
        let q = add(&db, &admin, other.id, "Elsewhere").await;

        let err = db.get_question(&admin, survey, q.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
        let err = db.delete_question(&admin, survey, q.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_guarded() {
        let (db, admin, survey) = setup().await;
        let q = add(&db, &admin, survey, "Name").await;

        let updated = db
            .update_question(
                &admin,
                survey,
                q.id,
                QuestionPatch {
                    mandatory: Some(false),
                    question_type: Some(QuestionType::Checkbox),
                    ..QuestionPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "Name");
        assert!(!updated.mandatory);
        assert_eq!(updated.question_type, QuestionType::Checkbox);

        let err = db
            .update_question(
                &admin,
                survey,
                q.id,
                QuestionPatch {
                    description: Some(" ".to_string()),
                    ..QuestionPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        db.lock_survey(&admin, survey).await.unwrap();
        let err = db
            .update_question(
                &admin,
                survey,
                q.id,
                QuestionPatch {
                    attachments: Some(true),
                    ..QuestionPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    fn conflict_message(err: DbError) -> String {
        match err {
            DbError::Conflict(message) => message,
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    async fn assert_structure_frozen(
        db: &SurveyDb,
        admin: &Principal,
        survey: SurveyId,
        first: QuestionId,
        second: QuestionId,
        expected: &str,
    ) {
        let err = db
            .create_question(admin, survey, NewQuestion::new("Late"))
            .await
            .unwrap_err();
        assert_eq!(conflict_message(err), expected);

        let err = db
            .update_question(
                admin,
                survey,
                first,
                QuestionPatch {
                    note: Some("Edited".to_string()),
                    ..QuestionPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(conflict_message(err), expected);

        let err = db
            .move_question(admin, survey, second, Direction::Up)
            .await
            .unwrap_err();
        assert_eq!(conflict_message(err), expected);

        let err = db.delete_question(admin, survey, first).await.unwrap_err();
        assert_eq!(conflict_message(err), expected);
    }

    #[tokio::test]
    async fn test_locked_survey_rejects_question_edits() {
        let (db, admin, survey) = setup().await;
        let q1 = add(&db, &admin, survey, "Q1").await;
        let q2 = add(&db, &admin, survey, "Q2").await;
        db.lock_survey(&admin, survey).await.unwrap();

        assert_structure_frozen(&db, &admin, survey, q1.id, q2.id, "Survey is locked").await;

        let left = db.list_questions(&admin, survey).await.unwrap();
        assert_eq!(
            indices(&left),
            vec![("Q1".to_string(), 1), ("Q2".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_deleted_unlocked_survey_rejects_question_edits() {
        let (db, admin, survey) = setup().await;
        let q1 = add(&db, &admin, survey, "Q1").await;
        let q2 = add(&db, &admin, survey, "Q2").await;
        db.delete_survey(&admin, survey).await.unwrap();

        let deleted = db.get_survey(&admin, survey).await.unwrap();
        assert!(!deleted.survey.is_locked());

        assert_structure_frozen(&db, &admin, survey, q1.id, q2.id, "Survey is deleted").await;
    }
}
