use axum::extract::{Path, State};
use axum::{Json, Router, routing::get, routing::post};
use pixelpeak_core::avatar::{AnimationClip, AvatarPreset, AvatarRecord, AvatarSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::clients::is_safe_id;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::routes::CapabilityResponse;
use crate::routes::patterns::DeleteOutcome;
use crate::state::AppState;

/// Avatar creation, which calls the vendor on every request.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/api/avatars/create-preset", post(create_preset))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/avatars", get(list_avatars))
        .route(
            "/api/avatars/{avatar_id}",
            get(avatar_info).delete(delete_avatar),
        )
        .route("/api/avatars/{avatar_id}/animations", get(avatar_animations))
}

fn default_preset() -> String {
    AvatarPreset::DefaultFemale.as_str().to_string()
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePresetRequest {
    /// `default_male`, `default_female` or `therapy_assistant`; anything
    /// else resolves to `default_female`
    #[serde(default = "default_preset")]
    pub preset_type: String,
    #[serde(default)]
    pub customizations: Option<serde_json::Value>,
}

#[derive(Serialize, ToSchema)]
pub struct AvatarList {
    pub avatars: Vec<AvatarSummary>,
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct AnimationList {
    pub avatar_id: String,
    pub animations: Vec<AnimationClip>,
    pub total: usize,
}

fn require_id(avatar_id: &str) -> Result<&str, AppError> {
    let trimmed = avatar_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_field(
            "avatar_id",
            "avatar_id must not be empty",
            None,
        ));
    }
    if !is_safe_id(trimmed) {
        return Err(AppError::invalid_field(
            "avatar_id",
            "avatar_id may only contain letters, digits, '_' and '-'",
            Some(serde_json::Value::String(avatar_id.to_string())),
        ));
    }
    Ok(trimmed)
}

#[utoipa::path(
    post,
    path = "/api/avatars/create-preset",
    request_body = CreatePresetRequest,
    responses(
        (status = 200, description = "Created avatar, or a fallback record", body = CapabilityResponse<AvatarRecord>),
        (status = 400, description = "Malformed body", body = pixelpeak_core::error::ApiError)
    ),
    tag = "avatars"
)]
pub async fn create_preset(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreatePresetRequest>,
) -> Result<Json<CapabilityResponse<AvatarRecord>>, AppError> {
    if let Some(custom) = &request.customizations {
        if !custom.is_object() {
            return Err(AppError::invalid_field(
                "customizations",
                "customizations must be a JSON object",
                Some(custom.clone()),
            ));
        }
    }
    let preset = AvatarPreset::parse_or_default(&request.preset_type);
    let result = state
        .orchestrator
        .avatar()
        .create_preset_avatar(preset, request.customizations)
        .await;
    Ok(Json(result.into()))
}

#[utoipa::path(
    get,
    path = "/api/avatars",
    responses((status = 200, description = "Known avatars", body = CapabilityResponse<AvatarList>)),
    tag = "avatars"
)]
pub async fn list_avatars(State(state): State<AppState>) -> Json<CapabilityResponse<AvatarList>> {
    let result = state
        .orchestrator
        .avatar()
        .list_avatars()
        .await
        .map(|avatars| AvatarList {
            total: avatars.len(),
            avatars,
        });
    Json(result.into())
}

#[utoipa::path(
    get,
    path = "/api/avatars/{avatar_id}",
    params(("avatar_id" = String, Path, description = "Avatar id")),
    responses(
        (status = 200, description = "Avatar details", body = CapabilityResponse<AvatarSummary>),
        (status = 400, description = "Blank id", body = pixelpeak_core::error::ApiError)
    ),
    tag = "avatars"
)]
pub async fn avatar_info(
    State(state): State<AppState>,
    Path(avatar_id): Path<String>,
) -> Result<Json<CapabilityResponse<AvatarSummary>>, AppError> {
    let avatar_id = require_id(&avatar_id)?;
    let result = state.orchestrator.avatar().avatar_info(avatar_id).await;
    Ok(Json(result.into()))
}

#[utoipa::path(
    delete,
    path = "/api/avatars/{avatar_id}",
    params(("avatar_id" = String, Path, description = "Avatar id")),
    responses(
        (status = 200, description = "Whether the avatar was deleted", body = CapabilityResponse<DeleteOutcome>),
        (status = 400, description = "Blank id", body = pixelpeak_core::error::ApiError)
    ),
    tag = "avatars"
)]
pub async fn delete_avatar(
    State(state): State<AppState>,
    Path(avatar_id): Path<String>,
) -> Result<Json<CapabilityResponse<DeleteOutcome>>, AppError> {
    let avatar_id = require_id(&avatar_id)?;
    let result = state
        .orchestrator
        .avatar()
        .delete_avatar(avatar_id)
        .await
        .map(|deleted| DeleteOutcome {
            id: avatar_id.to_string(),
            deleted,
        });
    Ok(Json(result.into()))
}

/// Built-in animation catalogue; never contacts the vendor.
#[utoipa::path(
    get,
    path = "/api/avatars/{avatar_id}/animations",
    params(("avatar_id" = String, Path, description = "Avatar id")),
    responses(
        (status = 200, description = "Animation clips", body = AnimationList),
        (status = 400, description = "Blank id", body = pixelpeak_core::error::ApiError)
    ),
    tag = "avatars"
)]
pub async fn avatar_animations(
    State(state): State<AppState>,
    Path(avatar_id): Path<String>,
) -> Result<Json<AnimationList>, AppError> {
    let avatar_id = require_id(&avatar_id)?;
    let animations = state.orchestrator.avatar().avatar_animations(avatar_id);
    Ok(Json(AnimationList {
        avatar_id: avatar_id.to_string(),
        total: animations.len(),
        animations,
    }))
}
