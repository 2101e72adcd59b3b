//! Access control ledger: one grant row per (survey, user).

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::info;

use crate::error::{DbError, Result};
use crate::principal::Principal;
use crate::surveys::require_survey;
use crate::types::AccessGrant;
use crate::users::fetch_user;
use crate::SurveyDb;
use surveyor_ids::{GrantId, SurveyId, UserId};

const GRANT_COLUMNS: &str = "id, survey_id, user_id, is_active";

fn row_to_grant(row: &SqliteRow) -> Result<AccessGrant> {
    Ok(AccessGrant {
        id: GrantId::new(row.try_get("id")?),
        survey_id: SurveyId::new(row.try_get("survey_id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        is_active: row.try_get("is_active")?,
    })
}

pub(crate) async fn grant_is_active(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
    user_id: UserId,
) -> Result<bool> {
    let active: Option<bool> = sqlx::query_scalar(
        "SELECT is_active FROM accesses WHERE survey_id = ? AND user_id = ?",
    )
    .bind(survey_id.get())
    .bind(user_id.get())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(active.unwrap_or(false))
}

/// Insert an active grant, or reactivate the existing row.
pub(crate) async fn upsert_grant(
    conn: &mut SqliteConnection,
    survey_id: SurveyId,
    user_id: UserId,
) -> Result<AccessGrant> {
    let sql = format!(
        r#"
        INSERT INTO accesses (survey_id, user_id, is_active)
        VALUES (?, ?, 1)
        ON CONFLICT(survey_id, user_id) DO UPDATE SET is_active = 1
        RETURNING {}
        "#,
        GRANT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(survey_id.get())
        .bind(user_id.get())
        .fetch_one(&mut *conn)
        .await?;

    row_to_grant(&row)
}

impl SurveyDb {
    /// Grant `user_id` access to a survey. Reactivates a revoked grant.
    pub async fn grant_access(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        user_id: UserId,
    ) -> Result<AccessGrant> {
        principal.require_admin()?;

        let mut tx = self.begin_write().await?;
        let survey = require_survey(&mut tx, survey_id).await?;
        if survey.is_deleted {
            return Err(DbError::conflict("Survey is deleted"));
        }
        if fetch_user(&mut tx, user_id).await?.is_none() {
            return Err(DbError::not_found("User not found"));
        }

        let grant = upsert_grant(&mut tx, survey_id, user_id).await?;
        tx.commit().await?;

        info!(survey_id = %survey_id, user_id = %user_id, "Access granted");
        Ok(grant)
    }

    /// Deactivate a grant. The row stays for history.
    pub async fn revoke_access(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        user_id: UserId,
    ) -> Result<AccessGrant> {
        principal.require_admin()?;

        let sql = format!(
            "UPDATE accesses SET is_active = 0 WHERE survey_id = ? AND user_id = ? RETURNING {}",
            GRANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(survey_id.get())
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Access grant not found"))?;

        info!(survey_id = %survey_id, user_id = %user_id, "Access revoked");
        row_to_grant(&row)
    }

    /// Whether `user_id` holds an active grant. Admins may ask about anyone,
    /// other principals only about themselves.
    pub async fn is_access_active(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
        user_id: UserId,
    ) -> Result<bool> {
        if principal.id != user_id {
            principal.require_admin()?;
        }
        let mut conn = self.pool.acquire().await?;
        grant_is_active(&mut conn, survey_id, user_id).await
    }

    /// All grants of a survey, active or not.
    pub async fn list_grants(
        &self,
        principal: &Principal,
        survey_id: SurveyId,
    ) -> Result<Vec<AccessGrant>> {
        principal.require_admin()?;

        let mut conn = self.pool.acquire().await?;
        require_survey(&mut conn, survey_id).await?;

        let sql = format!(
            "SELECT {} FROM accesses WHERE survey_id = ? ORDER BY id",
            GRANT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(survey_id.get())
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(row_to_grant).collect()
    }
}
