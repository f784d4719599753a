//! Request extractors that report rejections as structured `AppError`s.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::error::AppError;

/// Drop-in for `axum::Json<T>`: a body that fails to deserialize becomes an
/// `AppError::Validation` naming the offending field, instead of axum's
/// plain-text 422.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(validation_error)
    }
}

fn validation_error(rejection: JsonRejection) -> AppError {
    let detail = rejection.body_text();
    AppError::Validation {
        field: Some(serde_field(&detail).unwrap_or_else(|| "body".to_string())),
        message: format!("Invalid request body: {detail}"),
        received: None,
        docs_hint: Some(
            "Compare the body with the endpoint schema at /api-doc/openapi.json.".to_string(),
        ),
    }
}

/// Field named by serde's "missing field `x`" / "unknown field `x`" /
/// "unknown variant `x`" messages.
fn serde_field(message: &str) -> Option<String> {
    ["missing field `", "unknown field `", "unknown variant `"]
        .iter()
        .find_map(|marker| {
            let rest = &message[message.find(marker)? + marker.len()..];
            rest.find('`').map(|end| rest[..end].to_string())
        })
}
