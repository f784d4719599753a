use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use pixelpeak_core::emotion::Emotion;
use pixelpeak_core::speech::{SpeechRequest, SpeechResult, VoiceInfo};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::clients::is_safe_id;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::routes::CapabilityResponse;
use crate::state::AppState;

const MAX_TEXT_CHARS: usize = 1000;

pub fn synthesis_router() -> Router<AppState> {
    Router::new().route("/api/process-speech", post(process_speech))
}

pub fn voices_router() -> Router<AppState> {
    Router::new().route("/api/voices", get(list_voices))
}

#[derive(Deserialize, ToSchema)]
pub struct ProcessSpeechRequest {
    pub text: String,
    /// Free-form label; unknown labels are treated as `neutral`
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VoiceList {
    pub voices: Vec<VoiceInfo>,
    pub total: usize,
}

/// Synthesize speech for `text` with the emotion's voice profile.
#[utoipa::path(
    post,
    path = "/api/process-speech",
    request_body = ProcessSpeechRequest,
    responses(
        (status = 200, description = "Audio, or a placeholder with supports_playback = false", body = CapabilityResponse<SpeechResult>),
        (status = 400, description = "Empty or oversized text", body = pixelpeak_core::error::ApiError)
    ),
    tag = "speech"
)]
pub async fn process_speech(
    State(state): State<AppState>,
    AppJson(request): AppJson<ProcessSpeechRequest>,
) -> Result<Json<CapabilityResponse<SpeechResult>>, AppError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation {
            message: "text must not be empty".to_string(),
            field: Some("text".to_string()),
            received: Some(serde_json::Value::String(request.text.clone())),
            docs_hint: Some("Send the sentence to speak, e.g. {\"text\": \"Let's go forward\"}.".to_string()),
        });
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::invalid_field(
            "text",
            format!("text must be at most {MAX_TEXT_CHARS} characters"),
            None,
        ));
    }

    let voice_id = request
        .voice_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(voice_id) = voice_id {
        if !is_safe_id(voice_id) {
            return Err(AppError::invalid_field(
                "voice_id",
                "voice_id may only contain letters, digits, '_' and '-'",
                Some(serde_json::Value::String(voice_id.to_string())),
            ));
        }
    }

    let speech_request = SpeechRequest {
        text: text.to_string(),
        emotion: request
            .emotion
            .as_deref()
            .map(Emotion::parse_or_neutral)
            .unwrap_or(Emotion::Neutral),
        voice_id: voice_id.map(str::to_string),
    };
    let result = state
        .orchestrator
        .speech()
        .text_to_speech(&speech_request)
        .await;
    Ok(Json(result.into()))
}

#[utoipa::path(
    get,
    path = "/api/voices",
    responses((status = 200, description = "Available voices", body = CapabilityResponse<VoiceList>)),
    tag = "speech"
)]
pub async fn list_voices(State(state): State<AppState>) -> Json<CapabilityResponse<VoiceList>> {
    let result = state
        .orchestrator
        .speech()
        .available_voices()
        .await
        .map(|voices| VoiceList {
            total: voices.len(),
            voices,
        });
    Json(result.into())
}
