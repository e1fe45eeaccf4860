//! Surveys, questions, responses, and answers.
//!
//! Free functions operate on a borrowed connection; [`SurveyStore`] is the
//! narrow port the conversation engine depends on.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::core::error::{AppError, AppResult};
use crate::core::types::{QuestionType, ResponseStatus};
use crate::storage::db::{get_connection, DbPool};
use crate::storage::models::{Answer, Question, QuestionOption, Survey, SurveyDetail, SurveyResponse};

/// Payload for creating a survey with its full question set.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSurvey {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_days_after_start")]
    pub days_after_start: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub order_index: Option<i64>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_days_after_start() -> i64 {
    crate::core::config::survey::DEFAULT_DAYS_AFTER_START
}

fn default_true() -> bool {
    true
}

fn row_to_survey(row: &Row<'_>) -> rusqlite::Result<Survey> {
    Ok(Survey {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        days_after_start: row.get("days_after_start")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_response(row: &Row<'_>) -> rusqlite::Result<SurveyResponse> {
    let status: String = row.get("status")?;
    let status = ResponseStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown response status '{}'", status).into(),
        )
    })?;

    Ok(SurveyResponse {
        id: row.get("id")?,
        survey_id: row.get("survey_id")?,
        employee_id: row.get("employee_id")?,
        status,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

fn row_to_answer(row: &Row<'_>) -> rusqlite::Result<Answer> {
    let raw_options: Option<String> = row.get("answer_options")?;
    let answer_options = match raw_options {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Answer {
        id: row.get("id")?,
        response_id: row.get("response_id")?,
        question_id: row.get("question_id")?,
        answer_text: row.get("answer_text")?,
        answer_options,
        created_at: row.get("created_at")?,
    })
}

// ---------------------------------------------------------------------------
// Surveys and questions
// ---------------------------------------------------------------------------

pub fn create_survey(conn: &mut Connection, new: &NewSurvey) -> AppResult<SurveyDetail> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO surveys (title, description, days_after_start, is_active)
         VALUES (?1, ?2, ?3, ?4)",
        params![new.title, new.description, new.days_after_start, new.is_active],
    )?;
    let survey_id = tx.last_insert_rowid();
    insert_questions(&tx, survey_id, &new.questions)?;

    tx.commit()?;
    get_survey_detail(conn, survey_id)?
        .ok_or_else(|| AppError::NotFound(format!("survey {} after insert", survey_id)))
}

/// Replaces the survey header and its entire question set.
pub fn update_survey(conn: &mut Connection, survey_id: i64, new: &NewSurvey) -> AppResult<Option<SurveyDetail>> {
    let tx = conn.transaction()?;

    let changed = tx.execute(
        "UPDATE surveys SET title = ?2, description = ?3, days_after_start = ?4, is_active = ?5
         WHERE id = ?1",
        params![survey_id, new.title, new.description, new.days_after_start, new.is_active],
    )?;
    if changed == 0 {
        return Ok(None);
    }

    tx.execute("DELETE FROM questions WHERE survey_id = ?1", params![survey_id])?;
    insert_questions(&tx, survey_id, &new.questions)?;

    tx.commit()?;
    get_survey_detail(conn, survey_id)
}

fn insert_questions(tx: &rusqlite::Transaction<'_>, survey_id: i64, questions: &[NewQuestion]) -> AppResult<()> {
    for (position, q) in questions.iter().enumerate() {
        let order_index = q.order_index.unwrap_or(position as i64);
        tx.execute(
            "INSERT INTO questions (survey_id, question_text, question_type, order_index, is_required)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![survey_id, q.question_text, q.question_type.as_str(), order_index, q.is_required],
        )?;
        let question_id = tx.last_insert_rowid();

        for (opt_position, option_text) in q.options.iter().enumerate() {
            tx.execute(
                "INSERT INTO question_options (question_id, option_text, order_index)
                 VALUES (?1, ?2, ?3)",
                params![question_id, option_text, opt_position as i64],
            )?;
        }
    }
    Ok(())
}

pub fn delete_survey(conn: &Connection, survey_id: i64) -> AppResult<bool> {
    let changed = conn.execute("DELETE FROM surveys WHERE id = ?1", params![survey_id])?;
    Ok(changed > 0)
}

pub fn get_survey(conn: &Connection, survey_id: i64) -> AppResult<Option<Survey>> {
    conn.query_row("SELECT * FROM surveys WHERE id = ?1", params![survey_id], row_to_survey)
        .optional()
        .map_err(AppError::from)
}

pub fn list_surveys(conn: &Connection, active_only: bool) -> AppResult<Vec<Survey>> {
    let sql = if active_only {
        "SELECT * FROM surveys WHERE is_active = 1 ORDER BY id"
    } else {
        "SELECT * FROM surveys ORDER BY id"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], row_to_survey)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// Loads a survey with its questions and options, ordered by `order_index`.
pub fn get_survey_detail(conn: &Connection, survey_id: i64) -> AppResult<Option<SurveyDetail>> {
    let Some(survey) = get_survey(conn, survey_id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, survey_id, question_text, question_type, order_index, is_required
         FROM questions WHERE survey_id = ?1 ORDER BY order_index, id",
    )?;
    let mut questions = stmt
        .query_map(params![survey_id], |row| {
            let question_type: String = row.get("question_type")?;
            let question_type = QuestionType::parse(&question_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown question type '{}'", question_type).into(),
                )
            })?;
            Ok(Question {
                id: row.get("id")?,
                survey_id: row.get("survey_id")?,
                question_text: row.get("question_text")?,
                question_type,
                order_index: row.get("order_index")?,
                is_required: row.get("is_required")?,
                options: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut opt_stmt = conn.prepare(
        "SELECT o.id, o.question_id, o.option_text, o.order_index
         FROM question_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.survey_id = ?1
         ORDER BY o.order_index, o.id",
    )?;
    let options = opt_stmt
        .query_map(params![survey_id], |row| {
            Ok(QuestionOption {
                id: row.get("id")?,
                question_id: row.get("question_id")?,
                option_text: row.get("option_text")?,
                order_index: row.get("order_index")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for option in options {
        if let Some(question) = questions.iter_mut().find(|q| q.id == option.question_id) {
            question.options.push(option);
        }
    }

    Ok(Some(SurveyDetail { survey, questions }))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

const RESPONSE_COLUMNS: &str = "id, survey_id, employee_id, status, started_at, completed_at";

pub fn get_response(conn: &Connection, response_id: i64) -> AppResult<Option<SurveyResponse>> {
    conn.query_row(
        &format!("SELECT {} FROM survey_responses WHERE id = ?1", RESPONSE_COLUMNS),
        params![response_id],
        row_to_response,
    )
    .optional()
    .map_err(AppError::from)
}

/// The employee's non-terminal response to a survey, if one exists.
pub fn find_open_response(conn: &Connection, survey_id: i64, employee_id: i64) -> AppResult<Option<SurveyResponse>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM survey_responses
             WHERE survey_id = ?1 AND employee_id = ?2
               AND status IN ('pending', 'in_progress')
             ORDER BY id DESC LIMIT 1",
            RESPONSE_COLUMNS
        ),
        params![survey_id, employee_id],
        row_to_response,
    )
    .optional()
    .map_err(AppError::from)
}

/// Returns the existing non-terminal response or creates a fresh pending one.
///
/// At most one non-terminal response per (survey, employee) pair exists at any
/// time; the boolean reports whether a new row was inserted.
pub fn get_or_create_response(
    conn: &Connection,
    survey_id: i64,
    employee_id: i64,
) -> AppResult<(SurveyResponse, bool)> {
    if let Some(existing) = find_open_response(conn, survey_id, employee_id)? {
        return Ok((existing, false));
    }

    conn.execute(
        "INSERT INTO survey_responses (survey_id, employee_id, status) VALUES (?1, ?2, 'pending')",
        params![survey_id, employee_id],
    )?;
    let id = conn.last_insert_rowid();
    let response =
        get_response(conn, id)?.ok_or_else(|| AppError::NotFound(format!("response {} after insert", id)))?;
    Ok((response, true))
}

/// Moves a response into `status`; stamps `completed_at` on terminal
/// statuses. A response that already reached a terminal status is frozen.
pub fn set_response_status(conn: &Connection, response_id: i64, status: ResponseStatus) -> AppResult<()> {
    let current = get_response(conn, response_id)?
        .ok_or_else(|| AppError::NotFound(format!("response {}", response_id)))?;
    if current.status.is_terminal() {
        return Err(AppError::StateMismatch(format!(
            "response {} is already {}",
            response_id,
            current.status.as_str()
        )));
    }

    if status.is_terminal() {
        conn.execute(
            "UPDATE survey_responses SET status = ?2, completed_at = datetime('now') WHERE id = ?1",
            params![response_id, status.as_str()],
        )?;
    } else {
        conn.execute(
            "UPDATE survey_responses SET status = ?2 WHERE id = ?1",
            params![response_id, status.as_str()],
        )?;
    }
    Ok(())
}

pub fn list_responses(
    conn: &Connection,
    survey_id: Option<i64>,
    employee_id: Option<i64>,
    skip: i64,
    limit: i64,
) -> AppResult<Vec<SurveyResponse>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM survey_responses
         WHERE (?1 IS NULL OR survey_id = ?1)
           AND (?2 IS NULL OR employee_id = ?2)
         ORDER BY id LIMIT ?3 OFFSET ?4",
        RESPONSE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![survey_id, employee_id, limit, skip], row_to_response)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// Open responses for an employee, paired with the survey they belong to.
pub fn open_responses_with_surveys(
    conn: &Connection,
    employee_id: i64,
) -> AppResult<Vec<(SurveyResponse, Survey)>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.survey_id, r.employee_id, r.status, r.started_at, r.completed_at,
                s.id AS s_id, s.title, s.description, s.days_after_start, s.is_active, s.created_at
         FROM survey_responses r
         JOIN surveys s ON s.id = r.survey_id
         WHERE r.employee_id = ?1 AND r.status IN ('pending', 'in_progress') AND s.is_active = 1
         ORDER BY r.id",
    )?;
    let rows = stmt.query_map(params![employee_id], |row| {
        let response = row_to_response(row)?;
        let survey = Survey {
            id: row.get("s_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            days_after_start: row.get("days_after_start")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
        };
        Ok((response, survey))
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// Records one answer: free text or selected options, never both.
pub fn save_answer(
    conn: &Connection,
    response_id: i64,
    question_id: i64,
    answer_text: Option<&str>,
    answer_options: Option<&[i64]>,
) -> AppResult<()> {
    match (answer_text, answer_options) {
        (Some(_), None) => {}
        (None, Some(ids)) if !ids.is_empty() => {}
        _ => {
            return Err(AppError::InvalidInput(
                "an answer carries either text or a non-empty option set".to_string(),
            ))
        }
    }

    let options_json = match answer_options {
        Some(ids) => Some(serde_json::to_string(ids)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO answers (response_id, question_id, answer_text, answer_options)
         VALUES (?1, ?2, ?3, ?4)",
        params![response_id, question_id, answer_text, options_json],
    )?;
    Ok(())
}

pub fn answer_count(conn: &Connection, response_id: i64) -> AppResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM answers WHERE response_id = ?1",
        params![response_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn answers_for_response(conn: &Connection, response_id: i64) -> AppResult<Vec<Answer>> {
    let mut stmt = conn.prepare(
        "SELECT id, response_id, question_id, answer_text, answer_options, created_at
         FROM answers WHERE response_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![response_id], row_to_answer)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// All answers belonging to completed responses of a survey.
pub fn answers_for_completed(conn: &Connection, survey_id: i64) -> AppResult<Vec<Answer>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.response_id, a.question_id, a.answer_text, a.answer_options, a.created_at
         FROM answers a
         JOIN survey_responses r ON r.id = a.response_id
         WHERE r.survey_id = ?1 AND r.status = 'completed'
         ORDER BY a.response_id, a.id",
    )?;
    let rows = stmt.query_map(params![survey_id], row_to_answer)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
}

/// Response counts per status for a survey.
pub fn response_status_counts(conn: &Connection, survey_id: i64) -> AppResult<Vec<(ResponseStatus, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT status, count(*) FROM survey_responses WHERE survey_id = ?1 GROUP BY status",
    )?;
    let rows = stmt.query_map(params![survey_id], |row| {
        let status: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((status, count))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        let (status, count) = row?;
        if let Some(parsed) = ResponseStatus::parse(&status) {
            counts.push((parsed, count));
        }
    }
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Engine port
// ---------------------------------------------------------------------------

/// What the conversation engine needs from survey storage.
pub trait SurveyStore: Send + Sync + 'static {
    fn survey_with_questions(&self, survey_id: i64) -> AppResult<Option<SurveyDetail>>;
    fn find_open_response(&self, survey_id: i64, employee_id: i64) -> AppResult<Option<SurveyResponse>>;
    fn get_response(&self, response_id: i64) -> AppResult<Option<SurveyResponse>>;
    fn set_response_status(&self, response_id: i64, status: ResponseStatus) -> AppResult<()>;
    fn save_answer(
        &self,
        response_id: i64,
        question_id: i64,
        answer_text: Option<&str>,
        answer_options: Option<&[i64]>,
    ) -> AppResult<()>;
    fn answer_count(&self, response_id: i64) -> AppResult<usize>;
}

/// Pool-backed [`SurveyStore`].
#[derive(Clone)]
pub struct SqliteSurveyStore {
    pool: Arc<DbPool>,
}

impl SqliteSurveyStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl SurveyStore for SqliteSurveyStore {
    fn survey_with_questions(&self, survey_id: i64) -> AppResult<Option<SurveyDetail>> {
        let conn = get_connection(&self.pool)?;
        get_survey_detail(&conn, survey_id)
    }

    fn find_open_response(&self, survey_id: i64, employee_id: i64) -> AppResult<Option<SurveyResponse>> {
        let conn = get_connection(&self.pool)?;
        find_open_response(&conn, survey_id, employee_id)
    }

    fn get_response(&self, response_id: i64) -> AppResult<Option<SurveyResponse>> {
        let conn = get_connection(&self.pool)?;
        get_response(&conn, response_id)
    }

    fn set_response_status(&self, response_id: i64, status: ResponseStatus) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        set_response_status(&conn, response_id, status)
    }

    fn save_answer(
        &self,
        response_id: i64,
        question_id: i64,
        answer_text: Option<&str>,
        answer_options: Option<&[i64]>,
    ) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;
        save_answer(&conn, response_id, question_id, answer_text, answer_options)
    }

    fn answer_count(&self, response_id: i64) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        answer_count(&conn, response_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db;
    use crate::storage::employees::{self, NewEmployee};
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn seed_employee(conn: &Connection, telegram_id: i64) -> i64 {
        employees::create(
            conn,
            &NewEmployee {
                telegram_id,
                telegram_username: None,
                first_name: Some("Test".to_string()),
                last_name: None,
                start_date: "2026-01-01".parse().unwrap(),
                branch: None,
                department: None,
                position: None,
                language: "ru".to_string(),
            },
        )
        .unwrap()
        .id
    }

    fn onboarding_survey() -> NewSurvey {
        NewSurvey {
            title: "Onboarding check-in".to_string(),
            description: Some("How is it going?".to_string()),
            days_after_start: 90,
            is_active: true,
            questions: vec![
                NewQuestion {
                    question_text: "What do you like so far?".to_string(),
                    question_type: QuestionType::Text,
                    order_index: None,
                    is_required: true,
                    options: vec![],
                },
                NewQuestion {
                    question_text: "Rate your onboarding".to_string(),
                    question_type: QuestionType::SingleChoice,
                    order_index: None,
                    is_required: true,
                    options: vec!["Great".to_string(), "Okay".to_string(), "Poor".to_string()],
                },
                NewQuestion {
                    question_text: "Which tools do you use?".to_string(),
                    question_type: QuestionType::MultipleChoice,
                    order_index: None,
                    is_required: true,
                    options: vec!["Jira".to_string(), "Slack".to_string()],
                },
            ],
        }
    }

    #[test]
    fn create_survey_with_questions_and_options() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();

        assert_eq!(detail.questions.len(), 3);
        assert_eq!(detail.questions[0].options.len(), 0);
        assert_eq!(detail.questions[1].options.len(), 3);
        assert_eq!(detail.questions[1].question_type, QuestionType::SingleChoice);
        // Questions come back in insertion order.
        assert_eq!(detail.questions[0].order_index, 0);
        assert_eq!(detail.questions[2].order_index, 2);
    }

    #[test]
    fn update_survey_replaces_question_set() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();

        let mut replacement = onboarding_survey();
        replacement.title = "Revised check-in".to_string();
        replacement.questions.truncate(1);

        let updated = update_survey(&mut conn, detail.survey.id, &replacement).unwrap().unwrap();
        assert_eq!(updated.survey.title, "Revised check-in");
        assert_eq!(updated.questions.len(), 1);

        let orphan_options: i64 = conn
            .query_row("SELECT count(*) FROM question_options", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphan_options, 0);
    }

    #[test]
    fn single_open_response_per_pair() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let employee_id = seed_employee(&conn, 100);

        let (first, created) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();
        assert!(created);
        assert_eq!(first.status, ResponseStatus::Pending);

        let (second, created) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        // A terminal response frees the slot for a new attempt.
        set_response_status(&conn, first.id, ResponseStatus::Cancelled).unwrap();
        let (third, created) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();
        assert!(created);
        assert_ne!(third.id, first.id);
    }

    #[test]
    fn completion_stamps_completed_at() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let employee_id = seed_employee(&conn, 100);
        let (response, _) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();

        assert!(response.completed_at.is_none());
        set_response_status(&conn, response.id, ResponseStatus::Completed).unwrap();

        let done = get_response(&conn, response.id).unwrap().unwrap();
        assert_eq!(done.status, ResponseStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn terminal_response_status_is_frozen() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let employee_id = seed_employee(&conn, 100);
        let (response, _) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();

        set_response_status(&conn, response.id, ResponseStatus::Completed).unwrap();

        let err = set_response_status(&conn, response.id, ResponseStatus::InProgress).unwrap_err();
        assert!(matches!(err, AppError::StateMismatch(_)));
        let unchanged = get_response(&conn, response.id).unwrap().unwrap();
        assert_eq!(unchanged.status, ResponseStatus::Completed);
    }

    #[test]
    fn answer_must_carry_text_or_options() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let employee_id = seed_employee(&conn, 100);
        let (response, _) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();
        let question_id = detail.questions[0].id;

        let err = save_answer(&conn, response.id, question_id, None, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = save_answer(&conn, response.id, question_id, Some("both"), Some(&[1])).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = save_answer(&conn, response.id, question_id, None, Some(&[])).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert_eq!(answer_count(&conn, response.id).unwrap(), 0);
    }

    #[test]
    fn answers_round_trip_options_json() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let employee_id = seed_employee(&conn, 100);
        let (response, _) = get_or_create_response(&conn, detail.survey.id, employee_id).unwrap();

        let q_text = &detail.questions[0];
        let q_multi = &detail.questions[2];
        let picked: Vec<i64> = q_multi.options.iter().map(|o| o.id).collect();

        save_answer(&conn, response.id, q_text.id, Some("Love the team"), None).unwrap();
        save_answer(&conn, response.id, q_multi.id, None, Some(&picked)).unwrap();

        assert_eq!(answer_count(&conn, response.id).unwrap(), 2);

        let answers = answers_for_response(&conn, response.id).unwrap();
        assert_eq!(answers[0].answer_text.as_deref(), Some("Love the team"));
        assert_eq!(answers[1].answer_options.as_deref(), Some(picked.as_slice()));
    }

    #[test]
    fn completed_answers_exclude_open_responses() {
        let mut conn = test_conn();
        let detail = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let done_emp = seed_employee(&conn, 100);
        let open_emp = seed_employee(&conn, 200);
        let question_id = detail.questions[0].id;

        let (done, _) = get_or_create_response(&conn, detail.survey.id, done_emp).unwrap();
        save_answer(&conn, done.id, question_id, Some("finished"), None).unwrap();
        set_response_status(&conn, done.id, ResponseStatus::Completed).unwrap();

        let (open, _) = get_or_create_response(&conn, detail.survey.id, open_emp).unwrap();
        save_answer(&conn, open.id, question_id, Some("still going"), None).unwrap();

        let answers = answers_for_completed(&conn, detail.survey.id).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer_text.as_deref(), Some("finished"));
    }

    #[test]
    fn open_responses_listing_skips_inactive_surveys() {
        let mut conn = test_conn();
        let active = create_survey(&mut conn, &onboarding_survey()).unwrap();
        let mut inactive_payload = onboarding_survey();
        inactive_payload.is_active = false;
        let inactive = create_survey(&mut conn, &inactive_payload).unwrap();

        let employee_id = seed_employee(&conn, 100);
        get_or_create_response(&conn, active.survey.id, employee_id).unwrap();
        get_or_create_response(&conn, inactive.survey.id, employee_id).unwrap();

        let open = open_responses_with_surveys(&conn, employee_id).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].1.id, active.survey.id);
    }
}
