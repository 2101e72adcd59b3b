//! Integration tests for the survey core
//!
//! Drives the public `SurveyDb` API end to end: build, reorder, lock, version,
//! collect and submit.

use surveyor_db::{
    AnswerUpdate, DbError, DbOptions, Direction, NewOption, NewQuestion, NewRecord, NewUser,
    OptionSource, OptionType, Principal, QuestionId, QuestionType, RegistrationPolicy, SurveyDb,
    SurveyId, SurveyStatus,
};

const ADMIN_DOMAIN: &str = "agency.gov";

async fn register(db: &SurveyDb, email: &str) -> Principal {
    let policy = RegistrationPolicy {
        admin_domain: Some(ADMIN_DOMAIN.to_string()),
        admin_emails: Vec::new(),
    };
    let user = db
        .register_user(
            NewUser {
                first_name: "Test".to_string(),
                last_name: None,
                email: email.to_string(),
            },
            &policy,
        )
        .await
        .unwrap();
    db.resolve_principal(user.id).await.unwrap()
}

async fn setup() -> (SurveyDb, Principal, Principal) {
    let db = SurveyDb::open_memory().await.unwrap();
    let admin = register(&db, "admin@agency.gov").await;
    let user = register(&db, "enumerator@example.org").await;
    assert!(admin.is_admin());
    assert!(!user.is_admin());
    (db, admin, user)
}

async fn question_indices(db: &SurveyDb, admin: &Principal, survey: SurveyId) -> Vec<i64> {
    db.list_questions(admin, survey)
        .await
        .unwrap()
        .iter()
        .map(|q| q.index)
        .collect()
}

fn contiguous(indices: &[i64]) -> bool {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(pos, &index)| index == pos as i64 + 1)
}

/// Swap Q2 up: Q1 and Q2 exchange indices
#[tokio::test]
async fn test_swap_second_question_up() {
    let (db, admin, _) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();
    assert_eq!(survey.version, 1);
    assert_eq!(survey.status, SurveyStatus::Unlocked);

    let q1 = db
        .create_question(&admin, survey.id, NewQuestion::new("Q1"))
        .await
        .unwrap();
    let q2 = db
        .create_question(&admin, survey.id, NewQuestion::new("Q2"))
        .await
        .unwrap();
    assert_eq!((q1.index, q2.index), (1, 2));

    db.move_question(&admin, survey.id, q2.id, Direction::Up)
        .await
        .unwrap();

    let q1 = db.get_question(&admin, survey.id, q1.id).await.unwrap();
    let q2 = db.get_question(&admin, survey.id, q2.id).await.unwrap();
    assert_eq!(q1.index, 2);
    assert_eq!(q2.index, 1);
}

/// Deleting the middle of three questions shifts only the last one
#[tokio::test]
async fn test_delete_middle_question_compacts() {
    let (db, admin, _) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();

    let mut ids = Vec::new();
    for text in ["First", "Second", "Third"] {
        ids.push(
            db.create_question(&admin, survey.id, NewQuestion::new(text))
                .await
                .unwrap()
                .id,
        );
    }

    db.delete_question(&admin, survey.id, ids[1]).await.unwrap();

    let first = db.get_question(&admin, survey.id, ids[0]).await.unwrap();
    let third = db.get_question(&admin, survey.id, ids[2]).await.unwrap();
    assert_eq!(first.index, 1);
    assert_eq!(third.index, 2);
}

/// Locking freezes the survey; versioning yields an editable copy
#[tokio::test]
async fn test_lock_then_version() {
    let (db, admin, _) = setup().await;
    let survey = db
        .create_survey(&admin, "Census", Some("Household census"))
        .await
        .unwrap();
    db.create_question(&admin, survey.id, NewQuestion::new("Household size"))
        .await
        .unwrap();

    let err = db.create_version(&admin, survey.id, None).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    db.lock_survey(&admin, survey.id).await.unwrap();

    let err = db
        .update_survey_description(&admin, survey.id, Some("edited"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    let err = db
        .create_question(&admin, survey.id, NewQuestion::new("Late"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let v2 = db.create_version(&admin, survey.id, None).await.unwrap();
    let v2 = db.get_survey(&admin, v2).await.unwrap();
    assert_eq!(v2.survey.name, "Census");
    assert_eq!(v2.survey.version, 2);
    assert_eq!(v2.survey.status, SurveyStatus::Unlocked);
    assert_eq!(
        v2.survey.description.as_deref(),
        Some("Version 2: Household census")
    );

    // the copy is editable
    db.create_question(&admin, v2.survey.id, NewQuestion::new("Tenure"))
        .await
        .unwrap();

    // versioning v1 again skips past the newest version
    let v3 = db
        .create_version(&admin, survey.id, Some("Third pass"))
        .await
        .unwrap();
    let v3 = db.get_survey(&admin, v3).await.unwrap();
    assert_eq!(v3.survey.version, 3);
    assert_eq!(v3.survey.description.as_deref(), Some("Third pass"));
    assert_eq!(v3.questions.len(), 1);
}

/// Records need a locked survey and an active grant
#[tokio::test]
async fn test_record_preconditions() {
    let (db, admin, user) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();
    for text in ["Head of household", "Household size"] {
        db.create_question(&admin, survey.id, NewQuestion::new(text))
            .await
            .unwrap();
    }

    db.grant_access(&admin, survey.id, user.id).await.unwrap();
    let err = db
        .create_record(&user, survey.id, NewRecord::new("Smith", "12 High St"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    db.lock_survey(&admin, survey.id).await.unwrap();
    db.revoke_access(&admin, survey.id, user.id).await.unwrap();
    let err = db
        .create_record(&user, survey.id, NewRecord::new("Smith", "12 High St"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Forbidden(_)));

    db.grant_access(&admin, survey.id, user.id).await.unwrap();
    let record = db
        .create_record(&user, survey.id, NewRecord::new("Smith", "12 High St"))
        .await
        .unwrap();

    let answers = db.list_answers(&user, record.id).await.unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a.text.is_none()));
}

/// Submission waits for every TEXT answer; resubmitting re-stamps by default
#[tokio::test]
async fn test_submit_requires_text_answers() {
    let (db, admin, user) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();
    let name_q = db
        .create_question(&admin, survey.id, NewQuestion::new("Head of household"))
        .await
        .unwrap();
    db.create_question(
        &admin,
        survey.id,
        NewQuestion::new("Amenities").with_type(QuestionType::Checkbox),
    )
    .await
    .unwrap();
    db.lock_survey(&admin, survey.id).await.unwrap();
    db.grant_access(&admin, survey.id, user.id).await.unwrap();

    let record = db
        .create_record(&user, survey.id, NewRecord::new("Smith", "12 High St"))
        .await
        .unwrap();

    let err = db.submit_record(&user, record.id).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let answers = db.list_answers(&user, record.id).await.unwrap();
    let name_answer = answers
        .iter()
        .find(|a| a.question_id == name_q.id)
        .unwrap();
    db.update_answer(
        &user,
        record.id,
        name_q.id,
        name_answer.id,
        AnswerUpdate::text("Jane Smith"),
    )
    .await
    .unwrap();

    // the empty CHECKBOX answer does not block submission
    let submitted = db.submit_record(&user, record.id).await.unwrap();
    assert!(submitted.is_submitted());

    let again = db.submit_record(&user, record.id).await.unwrap();
    assert!(again.submitted_at >= submitted.submitted_at);
}

#[tokio::test]
async fn test_second_submit_conflicts_when_sealed() {
    let (db, admin, user) = setup().await;
    let db = db.with_options(DbOptions {
        seal_on_submit: true,
        ..DbOptions::default()
    });
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();
    db.lock_survey(&admin, survey.id).await.unwrap();
    db.grant_access(&admin, survey.id, user.id).await.unwrap();

    let record = db
        .create_record(&user, survey.id, NewRecord::new("Smith", "12 High St"))
        .await
        .unwrap();
    db.submit_record(&user, record.id).await.unwrap();

    let err = db.submit_record(&user, record.id).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

/// Indices stay 1..n through a mixed sequence of edits
#[tokio::test]
async fn test_indices_stay_contiguous() {
    let (db, admin, _) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();

    let mut ids: Vec<QuestionId> = Vec::new();
    for n in 1..=6 {
        ids.push(
            db.create_question(&admin, survey.id, NewQuestion::new(format!("Q{}", n)))
                .await
                .unwrap()
                .id,
        );
        assert!(contiguous(&question_indices(&db, &admin, survey.id).await));
    }

    db.delete_question(&admin, survey.id, ids[0]).await.unwrap();
    assert!(contiguous(&question_indices(&db, &admin, survey.id).await));

    db.move_question(&admin, survey.id, ids[5], Direction::Up)
        .await
        .unwrap();
    db.move_question(&admin, survey.id, ids[1], Direction::Down)
        .await
        .unwrap();
    assert!(contiguous(&question_indices(&db, &admin, survey.id).await));

    db.delete_question(&admin, survey.id, ids[3]).await.unwrap();
    db.create_question(&admin, survey.id, NewQuestion::new("Q7"))
        .await
        .unwrap();
    let indices = question_indices(&db, &admin, survey.id).await;
    assert_eq!(indices.len(), 5);
    assert!(contiguous(&indices));

    // link indices follow the same rule
    let question = ids[2];
    let mut links = Vec::new();
    for (value, description) in [("a", "A"), ("b", "B"), ("c", "C"), ("d", "D")] {
        links.push(
            db.attach_option(
                &admin,
                survey.id,
                question,
                OptionSource::NewCustom(NewOption {
                    value: value.to_string(),
                    description: description.to_string(),
                }),
            )
            .await
            .unwrap()
            .link_id,
        );
    }
    db.detach_option(&admin, survey.id, question, links[1])
        .await
        .unwrap();
    db.move_option(&admin, survey.id, question, links[3], Direction::Up)
        .await
        .unwrap();
    let link_indices: Vec<i64> = db
        .list_links(&admin, survey.id, question)
        .await
        .unwrap()
        .iter()
        .map(|l| l.index)
        .collect();
    assert_eq!(link_indices, vec![1, 2, 3]);
}

/// A version copies questions in order, reuses SYSTEM options and
/// duplicates CUSTOM ones
#[tokio::test]
async fn test_version_copies_structure() {
    let (db, admin, _) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();

    let tenure = db
        .create_question(
            &admin,
            survey.id,
            NewQuestion::new("Tenure").with_type(QuestionType::Radio),
        )
        .await
        .unwrap();
    let dropped = db
        .create_question(&admin, survey.id, NewQuestion::new("Dropped"))
        .await
        .unwrap();
    db.create_question(
        &admin,
        survey.id,
        NewQuestion::new("Notes").with_note("Free text"),
    )
    .await
    .unwrap();
    db.delete_question(&admin, survey.id, dropped.id)
        .await
        .unwrap();

    let yes = db
        .create_system_option(
            &admin,
            NewOption {
                value: "Y".to_string(),
                description: "Yes".to_string(),
            },
        )
        .await
        .unwrap();
    db.attach_option(&admin, survey.id, tenure.id, OptionSource::Existing(yes.id))
        .await
        .unwrap();
    let custom = db
        .attach_option(
            &admin,
            survey.id,
            tenure.id,
            OptionSource::NewCustom(NewOption {
                value: "rent".to_string(),
                description: "Rented".to_string(),
            }),
        )
        .await
        .unwrap();

    db.lock_survey(&admin, survey.id).await.unwrap();
    let source = db.get_survey(&admin, survey.id).await.unwrap();
    let copy_id = db.create_version(&admin, survey.id, None).await.unwrap();
    let copy = db.get_survey(&admin, copy_id).await.unwrap();

    assert_eq!(copy.questions.len(), source.questions.len());
    for (old, new) in source.questions.iter().zip(&copy.questions) {
        assert_ne!(old.question.id, new.question.id);
        assert_eq!(new.question.survey_id, copy_id);
        assert_eq!(old.question.description, new.question.description);
        assert_eq!(old.question.question_type, new.question.question_type);
        assert_eq!(old.question.note, new.question.note);
        assert_eq!(old.question.index, new.question.index);
        assert_eq!(old.options.len(), new.options.len());
    }

    let copied_links = &copy.questions[0].options;
    assert_eq!(copied_links[0].option.id, yes.id);
    assert_eq!(copied_links[0].index, 1);

    let copied_custom = &copied_links[1].option;
    assert_eq!(copied_custom.option_type, OptionType::Custom);
    assert_ne!(copied_custom.id, custom.option.id);
    assert_eq!(copied_custom.survey_id, Some(copy_id));
    assert_eq!(copied_custom.value, "rent");
    assert_eq!(copied_custom.description, "Rented");
    assert_eq!(copied_links[1].index, 2);
}

#[tokio::test]
async fn test_deleted_survey_cascades_custom_options() {
    let (db, admin, user) = setup().await;
    let survey = db.create_survey(&admin, "Census", None).await.unwrap();
    let q = db
        .create_question(&admin, survey.id, NewQuestion::new("Tenure"))
        .await
        .unwrap();
    let custom = db
        .attach_option(
            &admin,
            survey.id,
            q.id,
            OptionSource::NewCustom(NewOption {
                value: "own".to_string(),
                description: "Owned".to_string(),
            }),
        )
        .await
        .unwrap();
    db.grant_access(&admin, survey.id, user.id).await.unwrap();

    db.delete_survey(&admin, survey.id).await.unwrap();

    let option = db.get_option(&admin, custom.option.id).await.unwrap();
    assert!(option.is_deleted);

    let err = db.get_survey(&user, survey.id).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));

    let tree = db.get_survey(&admin, survey.id).await.unwrap();
    assert!(tree.survey.is_deleted);
    assert!(tree.questions.is_empty());
}
