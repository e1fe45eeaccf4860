//! REST API for the HR admin side.

pub mod bot;
pub mod employees;
pub mod responses;
pub mod surveys;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::core::error::AppError;
use crate::storage::db::DbPool;
use crate::telegram::notifications::NotificationService;

/// Shared state for every API handler.
#[derive(Clone)]
pub struct ApiState {
    pub db_pool: Arc<DbPool>,
    pub notifier: Arc<NotificationService>,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// API-facing error with an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(what) => Self::NotFound(what),
            AppError::InvalidInput(what) => Self::BadRequest(what),
            AppError::StateMismatch(what) => Self::BadRequest(what),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Internal(detail) => {
                log::error!("API internal error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Builds the full application router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/employees", employees::routes())
        .nest("/api/v1/surveys", surveys::routes())
        .nest("/api/v1/responses", responses::routes().nest("/surveys", responses::survey_routes()))
        .nest("/api/v1/bot", bot::routes())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
