//! Survey CRUD endpoints. Updating a survey replaces its whole question set.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::storage::db::get_connection;
use crate::storage::models::{Survey, SurveyDetail};
use crate::storage::surveys::{self, NewSurvey};

use super::{ApiError, ApiResult, ApiState};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    active_only: bool,
}

async fn list(State(state): State<ApiState>, Query(params): Query<ListParams>) -> ApiResult<Json<Vec<Survey>>> {
    let conn = get_connection(&state.db_pool)?;
    Ok(Json(surveys::list_surveys(&conn, params.active_only)?))
}

async fn create(
    State(state): State<ApiState>,
    Json(payload): Json<NewSurvey>,
) -> ApiResult<(StatusCode, Json<SurveyDetail>)> {
    validate(&payload)?;
    let mut conn = get_connection(&state.db_pool)?;
    let detail = surveys::create_survey(&mut conn, &payload)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_one(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<SurveyDetail>> {
    let conn = get_connection(&state.db_pool)?;
    surveys::get_survey_detail(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("survey {}", id)))
}

async fn update(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewSurvey>,
) -> ApiResult<Json<SurveyDetail>> {
    validate(&payload)?;
    let mut conn = get_connection(&state.db_pool)?;
    surveys::update_survey(&mut conn, id, &payload)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("survey {}", id)))
}

async fn delete_one(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let conn = get_connection(&state.db_pool)?;
    if surveys::delete_survey(&conn, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("survey {}", id)))
    }
}

fn validate(payload: &NewSurvey) -> ApiResult<()> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if payload.days_after_start < 0 {
        return Err(ApiError::BadRequest("days_after_start must not be negative".to_string()));
    }
    for question in &payload.questions {
        if question.question_text.trim().is_empty() {
            return Err(ApiError::BadRequest("question_text must not be empty".to_string()));
        }
        let needs_options = !matches!(question.question_type, crate::core::types::QuestionType::Text);
        if needs_options && question.options.len() < 2 {
            return Err(ApiError::BadRequest(format!(
                "choice question '{}' needs at least two options",
                question.question_text
            )));
        }
        if !needs_options && !question.options.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "text question '{}' must not carry options",
                question.question_text
            )));
        }
    }
    Ok(())
}
