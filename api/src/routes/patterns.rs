use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get, routing::post};
use pixelpeak_core::emotion::Emotion;
use pixelpeak_core::patterns::{IndexStats, PatternQuery, PatternRecord, SimilarPattern};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::routes::CapabilityResponse;
use crate::state::AppState;

const MAX_TOP_K: usize = 20;
const MAX_LIMIT: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/similar-patterns", post(similar_patterns))
        .route("/api/patterns/stats", get(index_stats))
        .route("/api/patterns/by-emotion/{emotion}", get(patterns_by_emotion))
        .route(
            "/api/patterns/{pattern_id}",
            get(get_pattern).delete(delete_pattern),
        )
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f64 {
    0.7
}

fn default_limit() -> usize {
    10
}

#[derive(Deserialize, ToSchema)]
pub struct SimilarPatternsRequest {
    #[serde(flatten)]
    pub query: PatternQuery,
    /// 1..=20, default 5
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity in [0, 1], default 0.7
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

#[derive(Serialize, ToSchema)]
pub struct PatternMatches {
    pub matches: Vec<SimilarPattern>,
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct PatternList {
    pub emotion: Emotion,
    pub patterns: Vec<PatternRecord>,
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteOutcome {
    pub id: String,
    /// True only when the backend confirmed the deletion
    pub deleted: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct LimitParams {
    /// 1..=50, default 10
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn require_id(pattern_id: &str) -> Result<&str, AppError> {
    let trimmed = pattern_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_field(
            "pattern_id",
            "pattern_id must not be empty",
            None,
        ));
    }
    Ok(trimmed)
}

#[utoipa::path(
    post,
    path = "/api/similar-patterns",
    request_body = SimilarPatternsRequest,
    responses(
        (status = 200, description = "Nearest stored patterns", body = CapabilityResponse<PatternMatches>),
        (status = 400, description = "top_k or min_score out of range", body = pixelpeak_core::error::ApiError)
    ),
    tag = "patterns"
)]
pub async fn similar_patterns(
    State(state): State<AppState>,
    AppJson(request): AppJson<SimilarPatternsRequest>,
) -> Result<Json<CapabilityResponse<PatternMatches>>, AppError> {
    if !(1..=MAX_TOP_K).contains(&request.top_k) {
        return Err(AppError::invalid_field(
            "top_k",
            format!("top_k must be between 1 and {MAX_TOP_K}"),
            Some(serde_json::json!(request.top_k)),
        ));
    }
    if !(0.0..=1.0).contains(&request.min_score) {
        return Err(AppError::invalid_field(
            "min_score",
            "min_score must be between 0 and 1",
            Some(serde_json::json!(request.min_score)),
        ));
    }

    let result = state
        .orchestrator
        .vector()
        .find_similar_patterns(&request.query, request.top_k, request.min_score)
        .await
        .map(|matches| PatternMatches {
            total: matches.len(),
            matches,
        });
    Ok(Json(result.into()))
}

#[utoipa::path(
    get,
    path = "/api/patterns/stats",
    responses((status = 200, description = "Index statistics", body = CapabilityResponse<IndexStats>)),
    tag = "patterns"
)]
pub async fn index_stats(State(state): State<AppState>) -> Json<CapabilityResponse<IndexStats>> {
    Json(state.orchestrator.vector().index_stats().await.into())
}

#[utoipa::path(
    get,
    path = "/api/patterns/by-emotion/{emotion}",
    params(("emotion" = String, Path, description = "Emotion label"), LimitParams),
    responses(
        (status = 200, description = "Stored patterns with this emotion", body = CapabilityResponse<PatternList>),
        (status = 400, description = "Unknown emotion or limit out of range", body = pixelpeak_core::error::ApiError)
    ),
    tag = "patterns"
)]
pub async fn patterns_by_emotion(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<CapabilityResponse<PatternList>>, AppError> {
    let emotion = Emotion::parse(&label).ok_or_else(|| {
        AppError::invalid_field(
            "emotion",
            format!("Unknown emotion '{label}'"),
            Some(serde_json::Value::String(label.clone())),
        )
    })?;
    if !(1..=MAX_LIMIT).contains(&params.limit) {
        return Err(AppError::invalid_field(
            "limit",
            format!("limit must be between 1 and {MAX_LIMIT}"),
            Some(serde_json::json!(params.limit)),
        ));
    }

    let result = state
        .orchestrator
        .vector()
        .search_by_emotion(emotion, params.limit)
        .await
        .map(|patterns| PatternList {
            emotion,
            total: patterns.len(),
            patterns,
        });
    Ok(Json(result.into()))
}

#[utoipa::path(
    get,
    path = "/api/patterns/{pattern_id}",
    params(("pattern_id" = String, Path, description = "Stored pattern id")),
    responses(
        (status = 200, description = "The stored pattern, or a synthetic record", body = CapabilityResponse<PatternRecord>),
        (status = 400, description = "Blank id", body = pixelpeak_core::error::ApiError)
    ),
    tag = "patterns"
)]
pub async fn get_pattern(
    State(state): State<AppState>,
    Path(pattern_id): Path<String>,
) -> Result<Json<CapabilityResponse<PatternRecord>>, AppError> {
    let pattern_id = require_id(&pattern_id)?;
    let result = state.orchestrator.vector().get_pattern(pattern_id).await;
    Ok(Json(result.into()))
}

#[utoipa::path(
    delete,
    path = "/api/patterns/{pattern_id}",
    params(("pattern_id" = String, Path, description = "Stored pattern id")),
    responses(
        (status = 200, description = "Whether the pattern was deleted", body = CapabilityResponse<DeleteOutcome>),
        (status = 400, description = "Blank id", body = pixelpeak_core::error::ApiError)
    ),
    tag = "patterns"
)]
pub async fn delete_pattern(
    State(state): State<AppState>,
    Path(pattern_id): Path<String>,
) -> Result<Json<CapabilityResponse<DeleteOutcome>>, AppError> {
    let pattern_id = require_id(&pattern_id)?;
    let result = state
        .orchestrator
        .vector()
        .delete_pattern(pattern_id)
        .await
        .map(|deleted| DeleteOutcome {
            id: pattern_id.to_string(),
            deleted,
        });
    Ok(Json(result.into()))
}
