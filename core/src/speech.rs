use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::emotion::Emotion;

/// Seconds of audio per spoken word, used when the real duration is unknown.
pub const SECONDS_PER_WORD: f64 = 0.6;

/// Input to speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpeechRequest {
    pub text: String,
    pub emotion: Emotion,
    /// Override the voice chosen from the emotion profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

/// Outcome of speech synthesis.
///
/// `success` stays true for fallbacks: movement and captions can still be
/// rendered. `supports_playback` tells the client whether `audio_url` holds
/// real audio.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpeechResult {
    pub success: bool,
    /// Playable audio, absent when synthesis fell back
    pub audio_url: Option<String>,
    /// URL of the stored artifact (audio or placeholder); always present
    pub artifact_url: String,
    pub filename: String,
    pub text: String,
    pub emotion: Emotion,
    pub voice_id: String,
    pub file_size: u64,
    pub duration_estimate: f64,
    pub supports_playback: bool,
    pub supports_movement: bool,
    pub supports_captions: bool,
    pub is_fallback: bool,
    pub generated_at: DateTime<Utc>,
}

/// A voice offered by the speech backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub available_for_tiers: Vec<String>,
}

pub fn duration_estimate(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * SECONDS_PER_WORD
}

/// Built-in voice list served when the backend cannot be reached.
pub fn default_voices() -> Vec<VoiceInfo> {
    let premade = |voice_id: &str, name: &str, description: &str| VoiceInfo {
        voice_id: voice_id.to_string(),
        name: name.to_string(),
        category: Some("premade".to_string()),
        description: Some(description.to_string()),
        preview_url: None,
        available_for_tiers: vec![
            "free".to_string(),
            "starter".to_string(),
            "creator".to_string(),
        ],
    };

    vec![
        premade(
            "21m00Tcm4TlvDq8ikWAM",
            "Rachel",
            "Calm, soothing female voice",
        ),
        premade("29vD33N1CtxCmqQRPOHJ", "Drew", "Energetic male voice"),
        premade("EXAVITQu4vr4xnSDxMaL", "Sarah", "Warm, caring female voice"),
    ]
}
