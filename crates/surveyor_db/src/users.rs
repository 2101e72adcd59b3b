//! User registry and principal resolution.

use regex::Regex;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::OnceLock;
use surveyor_protocol::SystemConfig;
use tracing::{debug, info};

use crate::error::{DbError, Result};
use crate::principal::{Principal, Role};
use crate::types::{NewUser, User};
use crate::{optional_text, required_text, SurveyDb};
use surveyor_ids::UserId;

const USER_COLUMNS: &str = "id, first_name, last_name, email, role, created_at, last_login";

const EMAIL_PATTERN: &str = r"^\w+([\.-]?\w+)*@\w+([\.-]?\w+)*(\.\w{2,3})+$";

fn is_valid_email(email: &str) -> Result<bool> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .ok_or_else(|| DbError::invalid_state("Email pattern failed to compile"))?;
    Ok(regex.is_match(email))
}

/// Who registers as ADMIN.
///
/// With an admin domain configured, every email in that domain is an admin and
/// the explicit list is ignored.
#[derive(Debug, Clone, Default)]
pub struct RegistrationPolicy {
    pub admin_domain: Option<String>,
    pub admin_emails: Vec<String>,
}

impl RegistrationPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            admin_domain: config.admin_domain.clone(),
            admin_emails: config.admin_emails.clone(),
        }
    }

    pub fn role_for(&self, email: &str) -> Role {
        let email = email.trim();
        let is_admin = match &self.admin_domain {
            Some(domain) => email
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain.trim())),
            None => self
                .admin_emails
                .iter()
                .any(|admin| admin.trim().eq_ignore_ascii_case(email)),
        };

        if is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role_raw: String = row.try_get("role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| DbError::invalid_state(format!("Invalid role: {}", role_raw)))?;

    Ok(User {
        id: UserId::new(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        role,
        created_at: SurveyDb::millis_to_datetime(row.try_get("created_at")?),
        last_login: SurveyDb::opt_millis_to_datetime(row.try_get("last_login")?),
    })
}

pub(crate) async fn fetch_user(conn: &mut SqliteConnection, id: UserId) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

impl SurveyDb {
    /// Register a user. Emails are stored lower-cased.
    pub async fn register_user(&self, new: NewUser, policy: &RegistrationPolicy) -> Result<User> {
        let first_name = required_text(&new.first_name, "First name")?;
        let last_name = optional_text(new.last_name.as_deref());
        let email = required_text(&new.email, "Email")?.to_lowercase();
        if !is_valid_email(&email)? {
            return Err(DbError::validation(format!("Invalid email: {}", email)));
        }
        let role = policy.role_for(&email);

        let sql = format!(
            r#"
            INSERT INTO users (first_name, last_name, email, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&first_name)
            .bind(&last_name)
            .bind(&email)
            .bind(role.as_str())
            .bind(Self::now_millis())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError::from(e).reword_conflict("User with that email already exists"))?;

        let user = row_to_user(&row)?;
        info!(user_id = %user.id, role = user.role.as_str(), "User registered");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Turn an authenticated user id into the principal every operation takes.
    pub async fn resolve_principal(&self, id: UserId) -> Result<Principal> {
        let role_raw: Option<String> = sqlx::query_scalar(
            "UPDATE users SET last_login = ? WHERE id = ? RETURNING role",
        )
        .bind(Self::now_millis())
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        let role_raw = role_raw.ok_or_else(|| DbError::unauthorized("Unknown user"))?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| DbError::invalid_state(format!("Invalid role: {}", role_raw)))?;

        debug!(user_id = %id, role = role.as_str(), "Principal resolved");
        Ok(Principal::new(id, role))
    }

    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<User>> {
        principal.require_admin()?;

        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_user).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Register a user with a fixed role, bypassing the policy.
    pub(crate) async fn insert_user(db: &SurveyDb, email: &str, role: Role) -> UserId {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (first_name, email, role, created_at) VALUES ('Test', ?, ?, 0) RETURNING id",
        )
        .bind(email)
        .bind(role.as_str())
        .fetch_one(db.pool())
        .await
        .unwrap();
        UserId::new(id)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("ada.lovelace@example.org").unwrap());
        assert!(is_valid_email("a-b@mail.example.co").unwrap());
        assert!(!is_valid_email("ada@").unwrap());
        assert!(!is_valid_email("ada@example").unwrap());
        assert!(!is_valid_email("no spaces@example.org").unwrap());
    }

    #[test]
    fn test_role_by_domain_wins_over_list() {
        let policy = RegistrationPolicy {
            admin_domain: Some("agency.gov".to_string()),
            admin_emails: vec!["boss@example.org".to_string()],
        };
        assert_eq!(policy.role_for("clerk@AGENCY.gov"), Role::Admin);
        assert_eq!(policy.role_for("boss@example.org"), Role::User);
    }

    #[test]
    fn test_role_by_email_list() {
        let policy = RegistrationPolicy {
            admin_domain: None,
            admin_emails: vec!["boss@example.org".to_string()],
        };
        assert_eq!(policy.role_for("Boss@Example.org"), Role::Admin);
        assert_eq!(policy.role_for("clerk@example.org"), Role::User);
        assert_eq!(RegistrationPolicy::default().role_for("x@y.org"), Role::User);
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let db = SurveyDb::open_memory().await.unwrap();
        let policy = RegistrationPolicy::default();

        let user = db
            .register_user(new_user("Ada@Example.org"), &policy)
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.org");
        assert_eq!(user.role, Role::User);
        assert!(user.last_login.is_none());

        let err = db
            .register_user(new_user("ada@example.org"), &policy)
            .await
            .unwrap_err();
        assert!(
            matches!(err, DbError::Conflict(ref m) if m == "User with that email already exists")
        );
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let db = SurveyDb::open_memory().await.unwrap();
        let policy = RegistrationPolicy::default();

        let mut blank_name = new_user("ada@example.org");
        blank_name.first_name = "  ".to_string();
        assert!(matches!(
            db.register_user(blank_name, &policy).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.register_user(new_user("not-an-email"), &policy).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_principal_stamps_login() {
        let db = SurveyDb::open_memory().await.unwrap();
        let policy = RegistrationPolicy {
            admin_domain: Some("example.org".to_string()),
            admin_emails: Vec::new(),
        };
        let user = db
            .register_user(new_user("ada@example.org"), &policy)
            .await
            .unwrap();

        let principal = db.resolve_principal(user.id).await.unwrap();
        assert!(principal.is_admin());
        let stored = db.get_user(user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());

        let err = db.resolve_principal(UserId::new(404)).await.unwrap_err();
        assert!(matches!(err, DbError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_find_user_by_email_ignores_case() {
        let db = SurveyDb::open_memory().await.unwrap();
        let user = db
            .register_user(new_user("ada@example.org"), &RegistrationPolicy::default())
            .await
            .unwrap();

        let found = db.find_user_by_email(" ADA@example.org ").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(db.find_user_by_email("bob@example.org").await.unwrap().is_none());
    }
}
