use axum::extract::Path;
use axum::{Json, Router, routing::get};
use pixelpeak_core::emotion::{Emotion, EmotionProfile};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/emotions/{emotion}", get(emotion_profile))
}

#[derive(Serialize, ToSchema)]
pub struct VoiceView {
    pub voice_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
}

#[derive(Serialize, ToSchema)]
pub struct MovementView {
    pub animation: String,
    pub facial_expression: String,
    pub gesture: String,
    pub intensity: f64,
    pub speed: f64,
}

#[derive(Serialize, ToSchema)]
pub struct CaptionView {
    pub text_color: String,
    pub background_color: String,
    pub font_weight: String,
    pub animation: String,
    pub icon: String,
}

#[derive(Serialize, ToSchema)]
pub struct EmotionProfileResponse {
    /// Label as sent by the caller
    pub requested: String,
    /// Resolved emotion; unknown labels resolve to `neutral`
    pub emotion: Emotion,
    pub voice: VoiceView,
    pub movement: MovementView,
    pub caption: CaptionView,
    pub speech_templates: Vec<String>,
}

impl EmotionProfileResponse {
    fn new(requested: String, profile: &EmotionProfile) -> Self {
        Self {
            requested,
            emotion: profile.emotion,
            voice: VoiceView {
                voice_id: profile.voice.voice_id.to_string(),
                stability: profile.voice.stability,
                similarity_boost: profile.voice.similarity_boost,
            },
            movement: MovementView {
                animation: profile.movement.animation.to_string(),
                facial_expression: profile.movement.facial_expression.to_string(),
                gesture: profile.movement.gesture.to_string(),
                intensity: profile.movement.intensity,
                speed: profile.movement.speed,
            },
            caption: CaptionView {
                text_color: profile.caption.text_color.to_string(),
                background_color: profile.caption.background_color.to_string(),
                font_weight: profile.caption.font_weight.to_string(),
                animation: profile.caption.animation.to_string(),
                icon: profile.caption.icon.to_string(),
            },
            speech_templates: profile
                .speech_templates
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/emotions/{emotion}",
    params(("emotion" = String, Path, description = "Emotion label")),
    responses((status = 200, description = "Voice, movement and caption settings", body = EmotionProfileResponse)),
    tag = "emotions"
)]
pub async fn emotion_profile(Path(label): Path<String>) -> Json<EmotionProfileResponse> {
    let profile = EmotionProfile::lookup(&label);
    Json(EmotionProfileResponse::new(label, profile))
}
