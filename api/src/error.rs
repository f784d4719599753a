use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pixelpeak_core::error::{self, ApiError};

/// Request-level errors. Vendor failures never end up here; they degrade
/// into fallback payloads inside the clients.
#[derive(Debug)]
pub enum AppError {
    /// Contract violation in the request (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// No such route (404)
    NotFound { resource: String },
}

impl AppError {
    pub fn invalid_field(
        field: &str,
        message: impl Into<String>,
        received: Option<serde_json::Value>,
    ) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            received,
            docs_hint: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some("See /swagger-ui for the available routes.".to_string()),
                },
            ),
        };

        (status, Json(api_error)).into_response()
    }
}
