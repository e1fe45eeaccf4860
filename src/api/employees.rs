//! Employee CRUD endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::storage::db::get_connection;
use crate::storage::employees::{self, EmployeeUpdate, NewEmployee};
use crate::storage::models::Employee;

use super::{ApiError, ApiResult, ApiState};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).put(update).delete(delete_one))
        .route("/telegram/{telegram_id}", get(get_by_telegram))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

async fn list(State(state): State<ApiState>, Query(params): Query<ListParams>) -> ApiResult<Json<Vec<Employee>>> {
    let conn = get_connection(&state.db_pool)?;
    Ok(Json(employees::list(&conn, params.skip, params.limit)?))
}

async fn create(
    State(state): State<ApiState>,
    Json(payload): Json<NewEmployee>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let conn = get_connection(&state.db_pool)?;
    if employees::get_by_telegram_id(&conn, payload.telegram_id)?.is_some() {
        return Err(ApiError::BadRequest(format!(
            "employee with telegram_id {} already exists",
            payload.telegram_id
        )));
    }
    let employee = employees::create(&conn, &payload)?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn get_one(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<Json<Employee>> {
    let conn = get_connection(&state.db_pool)?;
    employees::get(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("employee {}", id)))
}

async fn get_by_telegram(
    State(state): State<ApiState>,
    Path(telegram_id): Path<i64>,
) -> ApiResult<Json<Employee>> {
    let conn = get_connection(&state.db_pool)?;
    employees::get_by_telegram_id(&conn, telegram_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("employee with telegram_id {}", telegram_id)))
}

async fn update(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(payload): Json<EmployeeUpdate>,
) -> ApiResult<Json<Employee>> {
    let conn = get_connection(&state.db_pool)?;
    employees::update(&conn, id, &payload)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("employee {}", id)))
}

async fn delete_one(State(state): State<ApiState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let conn = get_connection(&state.db_pool)?;
    if employees::delete(&conn, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("employee {}", id)))
    }
}
