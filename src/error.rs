use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures that abort a scheduler run. Unmet weekly targets are not errors;
/// they come back as deficits.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no current term is active; nothing was scheduled")]
    NoActiveTerm,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            SchedulerError::NoActiveTerm => (StatusCode::CONFLICT, "NO_ACTIVE_TERM"),
            SchedulerError::Database(e) => {
                log::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            SchedulerError::InvalidRow(msg) => {
                log::error!("Invalid stored row: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_ROW")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}
