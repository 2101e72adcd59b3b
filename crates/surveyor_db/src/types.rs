//! Unified types for all Surveyor database entities.
//!
//! Enum columns are stored as upper-case TEXT; `as_str`/`parse` are the only
//! conversions between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surveyor_ids::{
    AnswerId, GrantId, LinkId, OptionId, QuestionId, RecordId, SurveyId, UserId,
};

use crate::principal::Role;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration input. Passwords and tokens live outside Surveyor.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
}

// ============================================================================
// Surveys
// ============================================================================

/// Survey lock state. One-way: UNLOCKED -> LOCKED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SurveyStatus {
    Unlocked,
    Locked,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlocked => "UNLOCKED",
            Self::Locked => "LOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UNLOCKED" => Some(Self::Unlocked),
            "LOCKED" => Some(Self::Locked),
            _ => None,
        }
    }
}

impl std::fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub name: String,
    pub description: Option<String>,
    pub version: i64,
    pub status: SurveyStatus,
    pub created_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub is_deleted: bool,
}

impl Survey {
    pub fn is_locked(&self) -> bool {
        self.status == SurveyStatus::Locked
    }
}

/// A survey with its active questions and their attached options, ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyTree {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<QuestionTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTree {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<LinkedOption>,
}

/// Filter for listing surveys
#[derive(Debug, Clone, Default)]
pub struct SurveyFilter {
    pub include_deleted: bool,
}

// ============================================================================
// Questions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    #[default]
    Text,
    Radio,
    Checkbox,
    None,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Radio => "RADIO",
            Self::Checkbox => "CHECKBOX",
            Self::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TEXT" => Some(Self::Text),
            "RADIO" => Some(Self::Radio),
            "CHECKBOX" => Some(Self::Checkbox),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub survey_id: SurveyId,
    pub description: String,
    pub note: Option<String>,
    pub mandatory: bool,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub attachments: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub index: i64,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub description: String,
    pub note: Option<String>,
    pub mandatory: bool,
    pub question_type: QuestionType,
    pub attachments: bool,
}

impl NewQuestion {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            note: None,
            mandatory: true,
            question_type: QuestionType::Text,
            attachments: false,
        }
    }

    pub fn with_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = question_type;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Partial question update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub description: Option<String>,
    pub note: Option<String>,
    pub mandatory: Option<bool>,
    pub question_type: Option<QuestionType>,
    pub attachments: Option<bool>,
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.note.is_none()
            && self.mandatory.is_none()
            && self.question_type.is_none()
            && self.attachments.is_none()
    }
}

// ============================================================================
// Options & Links
// ============================================================================

/// SYSTEM options are global; CUSTOM options belong to one survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    System,
    Custom,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Custom => "CUSTOM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SYSTEM" => Some(Self::System),
            "CUSTOM" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub value: String,
    pub description: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub is_deleted: bool,
    pub survey_id: Option<SurveyId>,
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub value: String,
    pub description: String,
}

/// Which option a link should point at.
#[derive(Debug, Clone)]
pub enum OptionSource {
    /// An existing SYSTEM option, or a CUSTOM option of the same survey
    Existing(OptionId),
    /// Create a CUSTOM option owned by the survey
    NewCustom(NewOption),
}

/// An active link joined with the option it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedOption {
    pub link_id: LinkId,
    pub index: i64,
    #[serde(flatten)]
    pub option: AnswerOption,
}

/// Filter for listing options
#[derive(Debug, Clone, Default)]
pub struct OptionFilter {
    pub include_deleted: bool,
    pub option_type: Option<OptionType>,
}

// ============================================================================
// Access
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: GrantId,
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub is_active: bool,
}

// ============================================================================
// Records & Answers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub survey_id: SurveyId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Submission stamp; `None` while the record is open
    pub submitted_at: Option<DateTime<Utc>>,
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub is_deleted: bool,
}

impl Record {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewRecord {
    pub subject_name: String,
    pub subject_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub record_id: RecordId,
    pub question_id: QuestionId,
    pub text: Option<String>,
    pub radio: Option<OptionId>,
    pub checkbox: Vec<OptionId>,
}

/// Full replacement of an answer's response fields.
#[derive(Debug, Clone, Default)]
pub struct AnswerUpdate {
    pub text: Option<String>,
    pub radio: Option<OptionId>,
    pub checkbox: Vec<OptionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_roundtrip() {
        for status in [SurveyStatus::Unlocked, SurveyStatus::Locked] {
            assert_eq!(SurveyStatus::parse(status.as_str()), Some(status));
        }
        for kind in [
            QuestionType::Text,
            QuestionType::Radio,
            QuestionType::Checkbox,
            QuestionType::None,
        ] {
            assert_eq!(QuestionType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OptionType::parse("custom"), Some(OptionType::Custom));
        assert_eq!(QuestionType::parse("essay"), None);
    }

    #[test]
    fn test_question_serializes_type_key() {
        let question = Question {
            id: QuestionId::new(1),
            survey_id: SurveyId::new(2),
            description: "Household size".to_string(),
            note: None,
            mandatory: true,
            question_type: QuestionType::Radio,
            attachments: false,
            is_deleted: false,
            created_at: Utc::now(),
            index: 1,
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["type"], "RADIO");
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn test_new_question_defaults() {
        let q = NewQuestion::new("Name");
        assert!(q.mandatory);
        assert_eq!(q.question_type, QuestionType::Text);
        assert!(!q.attachments);
        assert!(QuestionPatch::default().is_empty());
    }
}
