//! Integration tests across storage, the conversation engine, and the
//! aggregation queries behind the analytics endpoints.
//!
//! Run with: cargo test --test survey_platform_test

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use hr_survey_bot::conversation::{
    ConversationEngine, Notifier, RenderDirective, SurveyTrigger,
};
use hr_survey_bot::core::types::{QuestionType, ResponseStatus};
use hr_survey_bot::storage::conversation::{ConversationKey, ConversationStore};
use hr_survey_bot::storage::db::{create_pool, DbPool};
use hr_survey_bot::storage::employees::{self, NewEmployee};
use hr_survey_bot::storage::models::{Employee, SurveyDetail};
use hr_survey_bot::storage::surveys::{self, NewQuestion, NewSurvey, SqliteSurveyStore};

#[derive(Default)]
struct RecordingNotifier {
    completions: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    /// Completion notices arrive on a detached task; poll until they land.
    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if self.completions.lock().unwrap().len() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn survey_completed(&self, hr_telegram_id: i64, employee_name: &str, _survey_title: &str) {
        self.completions.lock().unwrap().push((hr_telegram_id, employee_name.to_string()));
    }
}

struct Platform {
    _dir: TempDir,
    pool: Arc<DbPool>,
    engine: ConversationEngine<SqliteSurveyStore, RecordingNotifier>,
    notifier: Arc<RecordingNotifier>,
    detail: SurveyDetail,
}

fn new_employee(telegram_id: i64, first_name: &str, start_date: &str) -> NewEmployee {
    NewEmployee {
        telegram_id,
        telegram_username: None,
        first_name: Some(first_name.to_string()),
        last_name: None,
        start_date: start_date.parse().unwrap(),
        branch: None,
        department: None,
        position: None,
        language: "ru".to_string(),
    }
}

fn setup() -> Platform {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("platform.sqlite");
    let pool = create_pool(path.to_str().unwrap()).unwrap();

    let mut conn = pool.get().unwrap();
    let detail = surveys::create_survey(
        &mut conn,
        &NewSurvey {
            title: "90-day check-in".to_string(),
            description: None,
            days_after_start: 90,
            is_active: true,
            questions: vec![
                NewQuestion {
                    question_text: "How is onboarding going?".to_string(),
                    question_type: QuestionType::SingleChoice,
                    order_index: None,
                    is_required: true,
                    options: vec!["Great".to_string(), "Okay".to_string()],
                },
                NewQuestion {
                    question_text: "Anything to add?".to_string(),
                    question_type: QuestionType::Text,
                    order_index: None,
                    is_required: true,
                    options: vec![],
                },
            ],
        },
    )
    .unwrap();
    drop(conn);

    let notifier = Arc::new(RecordingNotifier::default());
    let engine = ConversationEngine::new(
        ConversationStore::new(pool.clone()),
        Arc::new(SqliteSurveyStore::new(pool.clone())),
        notifier.clone(),
        vec![9000],
    );

    Platform { _dir: dir, pool, engine, notifier, detail }
}

fn invite(platform: &Platform, telegram_id: i64, name: &str) -> Employee {
    let conn = platform.pool.get().unwrap();
    let employee = employees::create(&conn, &new_employee(telegram_id, name, "2026-01-01")).unwrap();
    surveys::get_or_create_response(&conn, platform.detail.survey.id, employee.id).unwrap();
    employee
}

async fn complete_survey(platform: &Platform, employee: &Employee, note: &str) {
    let key = ConversationKey::new(employee.telegram_id, employee.telegram_id, 1);
    let survey_id = platform.detail.survey.id;
    let option = platform.detail.questions[0].options[0].id;

    platform
        .engine
        .handle(key, employee, SurveyTrigger::Start { survey_id })
        .await
        .unwrap();
    platform
        .engine
        .handle(key, employee, SurveyTrigger::Select { option_id: option })
        .await
        .unwrap();
    let reply = platform
        .engine
        .handle(key, employee, SurveyTrigger::Text(note.to_string()))
        .await
        .unwrap();
    assert!(matches!(reply.directive, RenderDirective::Completed));
}

#[tokio::test]
async fn two_employees_run_independent_sessions() {
    let platform = setup();
    let alice = invite(&platform, 100, "Alice");
    let bob = invite(&platform, 200, "Bob");

    let survey_id = platform.detail.survey.id;
    let alice_key = ConversationKey::new(100, 100, 1);
    let bob_key = ConversationKey::new(200, 200, 1);

    // Interleave the two conversations.
    platform.engine.handle(alice_key, &alice, SurveyTrigger::Start { survey_id }).await.unwrap();
    platform.engine.handle(bob_key, &bob, SurveyTrigger::Start { survey_id }).await.unwrap();

    let option = platform.detail.questions[0].options[1].id;
    platform
        .engine
        .handle(alice_key, &alice, SurveyTrigger::Select { option_id: option })
        .await
        .unwrap();

    // Bob cancelling must not touch Alice's session.
    platform.engine.handle(bob_key, &bob, SurveyTrigger::CancelPrompt).await.unwrap();
    platform.engine.handle(bob_key, &bob, SurveyTrigger::Cancel).await.unwrap();

    let reply = platform
        .engine
        .handle(alice_key, &alice, SurveyTrigger::Text("all good".to_string()))
        .await
        .unwrap();
    assert!(matches!(reply.directive, RenderDirective::Completed));

    let conn = platform.pool.get().unwrap();
    let statuses: Vec<ResponseStatus> = surveys::list_responses(&conn, Some(survey_id), None, 0, 10)
        .unwrap()
        .into_iter()
        .map(|r| r.status)
        .collect();
    assert!(statuses.contains(&ResponseStatus::Completed));
    assert!(statuses.contains(&ResponseStatus::Cancelled));

    platform.notifier.wait_for(1).await;
    let completions = platform.notifier.completions.lock().unwrap().clone();
    assert_eq!(completions, vec![(9000, "Alice".to_string())]);
}

#[tokio::test]
async fn analytics_sources_count_only_completed_responses() {
    let platform = setup();
    let survey_id = platform.detail.survey.id;

    let alice = invite(&platform, 100, "Alice");
    let bob = invite(&platform, 200, "Bob");
    complete_survey(&platform, &alice, "all fine").await;

    // Bob starts but does not finish.
    let bob_key = ConversationKey::new(200, 200, 1);
    platform.engine.handle(bob_key, &bob, SurveyTrigger::Start { survey_id }).await.unwrap();
    let option = platform.detail.questions[0].options[0].id;
    platform
        .engine
        .handle(bob_key, &bob, SurveyTrigger::Select { option_id: option })
        .await
        .unwrap();

    let conn = platform.pool.get().unwrap();
    let counts = surveys::response_status_counts(&conn, survey_id).unwrap();
    let of = |status: ResponseStatus| counts.iter().find(|(s, _)| *s == status).map(|(_, n)| *n).unwrap_or(0);
    assert_eq!(of(ResponseStatus::Completed), 1);
    assert_eq!(of(ResponseStatus::InProgress), 1);

    // Bob's answers stay out of the completed aggregate.
    let answers = surveys::answers_for_completed(&conn, survey_id).unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().any(|a| a.answer_text.as_deref() == Some("all fine")));
}

#[tokio::test]
async fn reminders_target_only_open_responses() {
    let platform = setup();
    let survey_id = platform.detail.survey.id;

    let alice = invite(&platform, 100, "Alice");
    invite(&platform, 200, "Bob");
    complete_survey(&platform, &alice, "done").await;

    let conn = platform.pool.get().unwrap();
    let open: Vec<_> = surveys::list_responses(&conn, Some(survey_id), None, 0, 100)
        .unwrap()
        .into_iter()
        .filter(|r| !r.status.is_terminal())
        .collect();

    assert_eq!(open.len(), 1);
    let remaining = employees::get(&conn, open[0].employee_id).unwrap().unwrap();
    assert_eq!(remaining.telegram_id, 200);
}

#[test]
fn eligibility_window_follows_the_survey_setting() {
    let platform = setup();
    let conn = platform.pool.get().unwrap();

    employees::create(&conn, &new_employee(1, "Old", "2026-01-01")).unwrap();
    employees::create(&conn, &new_employee(2, "New", "2026-08-15")).unwrap();

    let today = "2026-08-30".parse().unwrap();
    let eligible =
        employees::list_eligible(&conn, platform.detail.survey.days_after_start, today).unwrap();

    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].telegram_id, 1);
}
