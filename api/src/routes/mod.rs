pub mod avatars;
pub mod emotions;
pub mod health;
pub mod patterns;
pub mod scenarios;
pub mod speech;

use axum::http::Uri;
use pixelpeak_core::provenance::{CapabilityResult, ProvenanceMeta};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;

/// Body of every endpoint backed by a vendor call: the payload plus where
/// it came from.
#[derive(Debug, Serialize, ToSchema)]
pub struct CapabilityResponse<T> {
    pub data: T,
    pub meta: ProvenanceMeta,
}

impl<T> From<CapabilityResult<T>> for CapabilityResponse<T> {
    fn from(result: CapabilityResult<T>) -> Self {
        let (data, meta) = result.into_parts();
        Self { data, meta }
    }
}

/// Router fallback: unknown paths get a JSON 404.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound {
        resource: format!("route {}", uri.path()),
    }
}
