use std::collections::BTreeMap;

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::orchestrator::HealthReport;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(liveness))
        .route("/api/health", get(service_health))
}

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub status: String,
    pub docs: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceHealthResponse {
    #[serde(flatten)]
    pub report: HealthReport,
    /// Which vendor keys are present and well-formed
    pub api_keys: BTreeMap<String, bool>,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = ServiceInfo)),
    tag = "system"
)]
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "PixelPeak BCI API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        docs: "/swagger-ui".to_string(),
    })
}

/// Liveness only: answers without contacting any vendor.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up", body = HealthResponse)),
    tag = "system"
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Probe every vendor now. Degraded vendors still answer with fallbacks, so
/// this is always 200; read `status` and `services`.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Per-vendor health", body = ServiceHealthResponse)),
    tag = "system"
)]
pub async fn service_health(State(state): State<AppState>) -> Json<ServiceHealthResponse> {
    let report = state.orchestrator.probe_all().await;
    let api_keys = state
        .config
        .api_key_status()
        .into_iter()
        .map(|(vendor, ok)| (vendor.to_string(), ok))
        .collect();
    Json(ServiceHealthResponse { report, api_keys })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::routes::test_support::{call, get as get_request, offline_state};

    #[tokio::test]
    async fn offline_service_reports_degraded_with_every_vendor() {
        let dir = tempfile::tempdir().unwrap();
        let app = router().with_state(offline_state(dir.path()));

        let (status, body) = call(app, get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        for vendor in ["groq", "elevenlabs", "pinecone", "ready_player_me"] {
            assert_eq!(body["services"][vendor]["available"], false);
            assert_eq!(body["services"][vendor]["fallback_engaged"], true);
            assert_eq!(body["api_keys"][vendor], false);
        }
    }

    #[tokio::test]
    async fn liveness_does_not_need_vendors() {
        let dir = tempfile::tempdir().unwrap();
        let app = router().with_state(offline_state(dir.path()));
        let (status, body) = call(app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
