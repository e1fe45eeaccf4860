//! Response listing, per-survey results, analytics, and CSV export.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::core::types::{QuestionType, ResponseStatus};
use crate::storage::db::{get_connection, DbConnection};
use crate::storage::models::{Answer, SurveyDetail, SurveyResponse};
use crate::storage::{employees, surveys};

use super::{ApiError, ApiResult, ApiState};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_one))
}

/// Routes mounted under `/api/v1/responses/surveys`.
pub fn survey_routes() -> Router<ApiState> {
    Router::new()
        .route("/{id}/results", get(results))
        .route("/{id}/analytics", get(analytics))
        .route("/{id}/results/export", get(export_csv))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    survey_id: Option<i64>,
    employee_id: Option<i64>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

async fn list(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<SurveyResponse>>> {
    let conn = get_connection(&state.db_pool)?;
    Ok(Json(surveys::list_responses(
        &conn,
        params.survey_id,
        params.employee_id,
        params.skip,
        params.limit,
    )?))
}

async fn get_one(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<SurveyResponse>> {
    let conn = get_connection(&state.db_pool)?;
    surveys::get_response(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("response {}", id)))
}

#[derive(Debug, Serialize)]
struct ResultsPayload {
    survey_id: i64,
    title: String,
    responses: Vec<ResponseResult>,
}

#[derive(Debug, Serialize)]
struct ResponseResult {
    response_id: i64,
    employee_id: i64,
    employee_name: String,
    telegram_id: i64,
    status: ResponseStatus,
    started_at: String,
    completed_at: Option<String>,
    answers: Vec<AnswerResult>,
}

#[derive(Debug, Serialize)]
struct AnswerResult {
    question_id: i64,
    question_text: String,
    answer_text: Option<String>,
    selected_options: Option<Vec<String>>,
}

fn detail_or_404(conn: &DbConnection, survey_id: i64) -> ApiResult<SurveyDetail> {
    surveys::get_survey_detail(conn, survey_id)?
        .ok_or_else(|| ApiError::NotFound(format!("survey {}", survey_id)))
}

fn option_names(detail: &SurveyDetail) -> HashMap<i64, String> {
    detail
        .questions
        .iter()
        .flat_map(|q| q.options.iter())
        .map(|o| (o.id, o.option_text.clone()))
        .collect()
}

fn to_answer_result(detail: &SurveyDetail, names: &HashMap<i64, String>, answer: &Answer) -> AnswerResult {
    let question_text = detail
        .questions
        .iter()
        .find(|q| q.id == answer.question_id)
        .map(|q| q.question_text.clone())
        .unwrap_or_default();

    let selected_options = answer.answer_options.as_ref().map(|ids| {
        ids.iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| format!("option {}", id)))
            .collect()
    });

    AnswerResult {
        question_id: answer.question_id,
        question_text,
        answer_text: answer.answer_text.clone(),
        selected_options,
    }
}

fn collect_results(conn: &DbConnection, survey_id: i64) -> ApiResult<ResultsPayload> {
    let detail = detail_or_404(conn, survey_id)?;
    let names = option_names(&detail);
    let all = surveys::list_responses(conn, Some(survey_id), None, 0, i64::MAX)?;

    let mut responses = Vec::with_capacity(all.len());
    for response in all {
        let employee = employees::get(conn, response.employee_id)?;
        let (employee_name, telegram_id) = match employee {
            Some(emp) => (emp.display_name(), emp.telegram_id),
            None => (format!("employee #{}", response.employee_id), 0),
        };
        let answers = surveys::answers_for_response(conn, response.id)?
            .iter()
            .map(|a| to_answer_result(&detail, &names, a))
            .collect();

        responses.push(ResponseResult {
            response_id: response.id,
            employee_id: response.employee_id,
            employee_name,
            telegram_id,
            status: response.status,
            started_at: response.started_at,
            completed_at: response.completed_at,
            answers,
        });
    }

    Ok(ResultsPayload { survey_id, title: detail.survey.title, responses })
}

async fn results(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<ResultsPayload>> {
    let conn = get_connection(&state.db_pool)?;
    Ok(Json(collect_results(&conn, id)?))
}

#[derive(Debug, Serialize)]
struct AnalyticsPayload {
    survey_id: i64,
    title: String,
    total_responses: i64,
    completed: i64,
    in_progress: i64,
    pending: i64,
    cancelled: i64,
    completion_rate: f64,
    questions: Vec<QuestionAnalytics>,
}

#[derive(Debug, Serialize)]
struct QuestionAnalytics {
    question_id: i64,
    question_text: String,
    question_type: QuestionType,
    answered: usize,
    /// Option text to pick count; only for choice questions
    distribution: Option<HashMap<String, i64>>,
    /// Free-form answers; only for text questions
    text_answers: Option<Vec<String>>,
}

fn collect_analytics(conn: &DbConnection, survey_id: i64) -> ApiResult<AnalyticsPayload> {
    let detail = detail_or_404(conn, survey_id)?;
    let names = option_names(&detail);

    let counts = surveys::response_status_counts(conn, survey_id)?;
    let count_of = |status: ResponseStatus| -> i64 {
        counts.iter().find(|(s, _)| *s == status).map(|(_, n)| *n).unwrap_or(0)
    };
    let completed = count_of(ResponseStatus::Completed);
    let total: i64 = counts.iter().map(|(_, n)| n).sum();
    let completion_rate = if total > 0 { completed as f64 / total as f64 } else { 0.0 };

    // Only completed responses feed the per-question figures.
    let answers = surveys::answers_for_completed(conn, survey_id)?;
    let mut by_question: HashMap<i64, Vec<&Answer>> = HashMap::new();
    for answer in &answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    let mut questions = Vec::with_capacity(detail.questions.len());
    for question in &detail.questions {
        let empty = Vec::new();
        let question_answers = by_question.get(&question.id).unwrap_or(&empty);

        let (distribution, text_answers) = match question.question_type {
            QuestionType::Text => {
                let texts = question_answers
                    .iter()
                    .filter_map(|a| a.answer_text.clone())
                    .collect::<Vec<_>>();
                (None, Some(texts))
            }
            QuestionType::SingleChoice | QuestionType::MultipleChoice => {
                let mut dist: HashMap<String, i64> = HashMap::new();
                for answer in question_answers {
                    for id in answer.answer_options.iter().flatten() {
                        let name = names.get(id).cloned().unwrap_or_else(|| format!("option {}", id));
                        *dist.entry(name).or_insert(0) += 1;
                    }
                }
                (Some(dist), None)
            }
        };

        questions.push(QuestionAnalytics {
            question_id: question.id,
            question_text: question.question_text.clone(),
            question_type: question.question_type,
            answered: question_answers.len(),
            distribution,
            text_answers,
        });
    }

    Ok(AnalyticsPayload {
        survey_id,
        title: detail.survey.title,
        total_responses: total,
        completed,
        in_progress: count_of(ResponseStatus::InProgress),
        pending: count_of(ResponseStatus::Pending),
        cancelled: count_of(ResponseStatus::Cancelled),
        completion_rate,
        questions,
    })
}

async fn analytics(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<AnalyticsPayload>> {
    let conn = get_connection(&state.db_pool)?;
    Ok(Json(collect_analytics(&conn, id)?))
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn build_csv(payload: &ResultsPayload) -> String {
    let mut csv = String::from("response_id,employee,telegram_id,status,completed_at,question,answer\n");
    for response in &payload.responses {
        for answer in &response.answers {
            let value = match (&answer.answer_text, &answer.selected_options) {
                (Some(text), _) => text.clone(),
                (None, Some(options)) => options.join("; "),
                (None, None) => String::new(),
            };
            let row = [
                response.response_id.to_string(),
                csv_escape(&response.employee_name),
                response.telegram_id.to_string(),
                response.status.as_str().to_string(),
                response.completed_at.clone().unwrap_or_default(),
                csv_escape(&answer.question_text),
                csv_escape(&value),
            ];
            csv.push_str(&row.join(","));
            csv.push('\n');
        }
    }
    csv
}

async fn export_csv(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Response> {
    let conn = get_connection(&state.db_pool)?;
    let payload = collect_results(&conn, id)?;
    let csv = build_csv(&payload);
    let filename = format!("survey_{}_results.csv", id);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}
