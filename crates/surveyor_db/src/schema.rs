//! Database schema creation for all Surveyor tables.
//!
//! All CREATE TABLE statements live here - single source of truth. Timestamps
//! are INTEGER milliseconds since the Unix epoch. The question and link order
//! column is `idx` (`index` is reserved in SQL).

use crate::error::Result;
use crate::SurveyDb;
use tracing::info;

const TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL DEFAULT 'USER' CHECK (role IN ('ADMIN', 'USER')),
        created_at INTEGER NOT NULL,
        last_login INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS surveys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        version INTEGER NOT NULL CHECK (version > 0),
        status TEXT NOT NULL DEFAULT 'UNLOCKED' CHECK (status IN ('UNLOCKED', 'LOCKED')),
        created_at INTEGER NOT NULL,
        locked_at INTEGER,
        created_by INTEGER REFERENCES users(id),
        is_deleted INTEGER NOT NULL DEFAULT 0,
        UNIQUE(name, version)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id),
        description TEXT NOT NULL,
        note TEXT,
        mandatory INTEGER NOT NULL DEFAULT 1,
        type TEXT NOT NULL DEFAULT 'TEXT' CHECK (type IN ('TEXT', 'RADIO', 'CHECKBOX', 'NONE')),
        attachments INTEGER NOT NULL DEFAULT 0,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        idx INTEGER NOT NULL CHECK (idx >= 0)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        value TEXT NOT NULL,
        description TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'CUSTOM' CHECK (type IN ('SYSTEM', 'CUSTOM')),
        is_deleted INTEGER NOT NULL DEFAULT 0,
        survey_id INTEGER REFERENCES surveys(id),
        CHECK ((type = 'SYSTEM' AND survey_id IS NULL) OR (type = 'CUSTOM' AND survey_id IS NOT NULL))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS question_option (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question_id INTEGER NOT NULL REFERENCES questions(id),
        option_id INTEGER NOT NULL REFERENCES options(id),
        idx INTEGER NOT NULL CHECK (idx >= 0),
        is_deleted INTEGER NOT NULL DEFAULT 0,
        UNIQUE(question_id, option_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS accesses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE(survey_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        survey_id INTEGER NOT NULL REFERENCES surveys(id),
        created_by INTEGER NOT NULL REFERENCES users(id),
        created_at INTEGER NOT NULL,
        locked_at INTEGER,
        subject_name TEXT NOT NULL,
        subject_description TEXT,
        is_deleted INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS answers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id INTEGER NOT NULL REFERENCES records(id),
        question_id INTEGER NOT NULL REFERENCES questions(id),
        text TEXT,
        radio INTEGER,
        checkbox TEXT NOT NULL DEFAULT '[]',
        UNIQUE(record_id, question_id)
    )"#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_surveys_name ON surveys(name)",
    "CREATE INDEX IF NOT EXISTS idx_questions_survey ON questions(survey_id, is_deleted)",
    "CREATE INDEX IF NOT EXISTS idx_options_survey ON options(survey_id)",
    "CREATE INDEX IF NOT EXISTS idx_question_option_question ON question_option(question_id, is_deleted)",
    "CREATE INDEX IF NOT EXISTS idx_records_survey ON records(survey_id)",
    "CREATE INDEX IF NOT EXISTS idx_answers_record ON answers(record_id)",
];

impl SurveyDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        let mut tx = self.begin_write().await?;

        for ddl in TABLES.iter().chain(INDEXES) {
            sqlx::query(ddl).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        info!(tables = TABLES.len(), "Database schema verified");
        Ok(())
    }
}
