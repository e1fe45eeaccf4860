//! Bot-facing endpoints: survey initiation, invites, reminders, and
//! eligibility lookups.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::storage::db::get_connection;
use crate::storage::models::{Employee, Survey, SurveyResponse};
use crate::storage::{employees, surveys};

use super::{ApiError, ApiResult, ApiState};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/initiate-survey", post(initiate_survey))
        .route("/send-invite", post(send_invite))
        .route("/send-reminder", post(send_reminder))
        .route("/send-reminders-batch", post(send_reminders_batch))
        .route("/surveys/{telegram_id}", get(surveys_for_employee))
        .route("/eligible-employees/{survey_id}", get(eligible_employees))
        .route("/webhook", post(webhook_ack))
}

#[derive(Debug, Deserialize)]
struct SurveyTarget {
    employee_id: i64,
    survey_id: i64,
}

#[derive(Debug, Deserialize)]
struct ReminderTarget {
    employee_id: i64,
    survey_id: i64,
    days_left: Option<i64>,
}

/// Starts the survey process for one employee: checks the tenure window,
/// creates the pending response, and sends the invite.
async fn initiate_survey(
    State(state): State<ApiState>,
    Json(target): Json<SurveyTarget>,
) -> ApiResult<Json<SurveyResponse>> {
    let (employee, survey) = {
        let conn = get_connection(&state.db_pool)?;
        let employee = employees::get(&conn, target.employee_id)?
            .ok_or_else(|| ApiError::NotFound(format!("employee {}", target.employee_id)))?;
        let survey = surveys::get_survey(&conn, target.survey_id)?
            .ok_or_else(|| ApiError::NotFound(format!("survey {}", target.survey_id)))?;
        (employee, survey)
    };

    if !survey.is_active {
        return Err(ApiError::BadRequest(format!("survey {} is not active", survey.id)));
    }

    let today = chrono::Utc::now().date_naive();
    let tenure = employee.days_since_start(today);
    if tenure < survey.days_after_start {
        return Err(ApiError::BadRequest(format!(
            "employee {} has {} days of tenure, survey requires {}",
            employee.id, tenure, survey.days_after_start
        )));
    }

    state.notifier.send_survey_invite(employee.id, survey.id).await?;

    let conn = get_connection(&state.db_pool)?;
    let (response, _) = surveys::get_or_create_response(&conn, survey.id, employee.id)?;
    Ok(Json(response))
}

/// Sends an invite without the tenure check (manual HR override).
async fn send_invite(
    State(state): State<ApiState>,
    Json(target): Json<SurveyTarget>,
) -> ApiResult<Json<serde_json::Value>> {
    state.notifier.send_survey_invite(target.employee_id, target.survey_id).await?;
    Ok(Json(json!({ "status": "sent" })))
}

async fn send_reminder(
    State(state): State<ApiState>,
    Json(target): Json<ReminderTarget>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .notifier
        .send_reminder(target.employee_id, target.survey_id, target.days_left)
        .await?;
    Ok(Json(json!({ "status": "sent" })))
}

#[derive(Debug, Deserialize)]
struct BatchTarget {
    survey_id: i64,
}

async fn send_reminders_batch(
    State(state): State<ApiState>,
    Json(target): Json<BatchTarget>,
) -> ApiResult<Json<serde_json::Value>> {
    {
        let conn = get_connection(&state.db_pool)?;
        surveys::get_survey(&conn, target.survey_id)?
            .ok_or_else(|| ApiError::NotFound(format!("survey {}", target.survey_id)))?;
    }
    let delivered = state.notifier.send_reminders_for_survey(target.survey_id).await?;
    Ok(Json(json!({ "status": "sent", "delivered": delivered })))
}

#[derive(Debug, Serialize)]
struct OpenSurveyEntry {
    survey: Survey,
    response_id: i64,
    status: crate::core::types::ResponseStatus,
}

/// Open surveys for the employee behind a Telegram ID.
async fn surveys_for_employee(
    State(state): State<ApiState>,
    Path(telegram_id): Path<i64>,
) -> ApiResult<Json<Vec<OpenSurveyEntry>>> {
    let conn = get_connection(&state.db_pool)?;
    let employee = employees::get_by_telegram_id(&conn, telegram_id)?
        .ok_or_else(|| ApiError::NotFound(format!("employee with telegram_id {}", telegram_id)))?;

    let entries = surveys::open_responses_with_surveys(&conn, employee.id)?
        .into_iter()
        .map(|(response, survey)| OpenSurveyEntry {
            survey,
            response_id: response.id,
            status: response.status,
        })
        .collect();
    Ok(Json(entries))
}

/// Active employees whose tenure satisfies the survey's window.
async fn eligible_employees(
    State(state): State<ApiState>,
    Path(survey_id): Path<i64>,
) -> ApiResult<Json<Vec<Employee>>> {
    let conn = get_connection(&state.db_pool)?;
    let survey = surveys::get_survey(&conn, survey_id)?
        .ok_or_else(|| ApiError::NotFound(format!("survey {}", survey_id)))?;

    let today = chrono::Utc::now().date_naive();
    Ok(Json(employees::list_eligible(&conn, survey.days_after_start, today)?))
}

/// Acknowledges a posted Telegram update. In webhook mode updates are
/// ingested by the dedicated webhook listener; this endpoint only acks so an
/// upstream proxy never retries.
async fn webhook_ack(Json(update): Json<serde_json::Value>) -> Json<serde_json::Value> {
    log::debug!("webhook ack for update: {}", update.get("update_id").unwrap_or(&json!(null)));
    Json(json!({ "status": "ok" }))
}
