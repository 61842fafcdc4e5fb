use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::AppError;

/// API-specific error wrapper that converts AppError into HTTP responses.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Value::String(msg.clone())),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, Value::String(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Value::String(msg.clone())),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, Value::String(msg.clone())),
            // Violations travel as a JSON list; hand them back structured.
            AppError::Validation(payload) => (
                StatusCode::BAD_REQUEST,
                serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.clone())),
            ),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::String(format!("Database error: {}", msg)),
            ),
            AppError::Search(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Value::String(format!("Search error: {}", msg)),
            ),
            AppError::Config(msg) | AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Value::String(msg.clone()))
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}
