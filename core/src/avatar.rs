use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::emotion::Emotion;

/// Base URL where rendered avatar models are published.
pub const MODEL_HOST: &str = "https://models.readyplayer.me";

/// Named avatar presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AvatarPreset {
    DefaultMale,
    DefaultFemale,
    TherapyAssistant,
}

/// Appearance attributes for a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvatarAppearance {
    pub gender: String,
    pub style: String,
    pub outfit: String,
    pub expression: String,
}

impl AvatarPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            AvatarPreset::DefaultMale => "default_male",
            AvatarPreset::DefaultFemale => "default_female",
            AvatarPreset::TherapyAssistant => "therapy_assistant",
        }
    }

    /// Unknown preset names resolve to `default_female`.
    pub fn parse_or_default(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "default_male" => AvatarPreset::DefaultMale,
            "therapy_assistant" => AvatarPreset::TherapyAssistant,
            _ => AvatarPreset::DefaultFemale,
        }
    }

    pub fn appearance(self) -> AvatarAppearance {
        let (gender, style, outfit, expression) = match self {
            AvatarPreset::DefaultMale => ("male", "realistic", "casual", "calm"),
            AvatarPreset::DefaultFemale => ("female", "realistic", "medical", "encouraging"),
            AvatarPreset::TherapyAssistant => ("female", "professional", "therapist", "supportive"),
        };
        AvatarAppearance {
            gender: gender.to_string(),
            style: style.to_string(),
            outfit: outfit.to_string(),
            expression: expression.to_string(),
        }
    }
}

/// A created avatar.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarRecord {
    pub avatar_id: String,
    pub avatar_url: String,
    /// Stored record under the avatar artifact directory, if persisted
    #[serde(default)]
    pub local_path: Option<String>,
    pub preset_type: AvatarPreset,
    pub appearance: AvatarAppearance,
    /// Caller-supplied customizations, passed through verbatim
    #[serde(default)]
    pub customizations: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub model_format: String,
    pub animations_included: bool,
    pub ready_for_vr: bool,
    pub is_fallback: bool,
}

impl AvatarRecord {
    pub fn model_url(avatar_id: &str) -> String {
        format!("{MODEL_HOST}/{avatar_id}.glb")
    }
}

/// Short listing entry for an avatar.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvatarSummary {
    pub avatar_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub status: String,
    #[serde(default)]
    pub model_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Loop,
    Oneshot,
}

/// One avatar animation clip.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnimationClip {
    pub id: String,
    pub name: String,
    pub kind: AnimationKind,
    pub duration: f64,
    pub description: String,
    pub suitable_for_speech: bool,
    pub emotion_tag: Emotion,
}

/// Built-in animation catalogue.
pub fn default_animations() -> Vec<AnimationClip> {
    let clip = |id: &str,
                name: &str,
                kind,
                duration,
                description: &str,
                suitable_for_speech,
                emotion_tag| AnimationClip {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        duration,
        description: description.to_string(),
        suitable_for_speech,
        emotion_tag,
    };

    vec![
        clip(
            "idle",
            "Idle",
            AnimationKind::Loop,
            5.0,
            "Default idle animation",
            true,
            Emotion::Neutral,
        ),
        clip(
            "talking",
            "Talking",
            AnimationKind::Loop,
            3.0,
            "Speaking animation with lip sync",
            true,
            Emotion::Neutral,
        ),
        clip(
            "happy",
            "Happy",
            AnimationKind::Oneshot,
            2.0,
            "Happy expression animation",
            false,
            Emotion::Excited,
        ),
        clip(
            "sad",
            "Sad",
            AnimationKind::Oneshot,
            2.5,
            "Sad expression animation",
            false,
            Emotion::Sad,
        ),
        clip(
            "calm",
            "Calm",
            AnimationKind::Loop,
            4.0,
            "Peaceful, meditative animation",
            true,
            Emotion::Calm,
        ),
    ]
}

/// Fixed avatar listing served when the backend cannot be reached.
pub fn demo_avatars() -> Vec<AvatarSummary> {
    let now = Utc::now().to_rfc3339();
    vec![
        AvatarSummary {
            avatar_id: "demo_avatar_1".to_string(),
            name: "Therapy Assistant".to_string(),
            created_at: Some(now.clone()),
            status: "ready".to_string(),
            model_url: None,
        },
        AvatarSummary {
            avatar_id: "demo_avatar_2".to_string(),
            name: "Patient Avatar".to_string(),
            created_at: Some(now),
            status: "ready".to_string(),
            model_url: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_preset_resolves_to_default_female() {
        assert_eq!(
            AvatarPreset::parse_or_default("robot"),
            AvatarPreset::DefaultFemale
        );
        assert_eq!(
            AvatarPreset::parse_or_default("therapy_assistant"),
            AvatarPreset::TherapyAssistant
        );
        assert_eq!(AvatarPreset::TherapyAssistant.appearance().outfit, "therapist");
    }

    #[test]
    fn model_url_points_at_glb() {
        assert_eq!(
            AvatarRecord::model_url("abc"),
            "https://models.readyplayer.me/abc.glb"
        );
    }
}
