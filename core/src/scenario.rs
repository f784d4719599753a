use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::emotion::{Direction, Emotion, EmotionProfile};

pub const EMOTION_CONFIDENCE_RANGE: (f64, f64) = (0.70, 0.95);
pub const DIRECTION_CONFIDENCE_RANGE: (f64, f64) = (0.65, 0.95);

/// Canned sentences for the (emotion, direction) pairs that have one.
/// Every other pair uses the emotion's speech template.
const CANNED_SPEECH: &[(Emotion, Direction, &str)] = &[
    (
        Emotion::Calm,
        Direction::Forward,
        "I feel peaceful and ready to move forward",
    ),
    (
        Emotion::Excited,
        Direction::Left,
        "I'm energized! Let's turn left and explore",
    ),
    (
        Emotion::Sad,
        Direction::Stop,
        "I'm feeling down and need to stop here for a moment",
    ),
    (Emotion::Calm, Direction::Right, "Let me calmly turn to the right"),
    (
        Emotion::Anxious,
        Direction::Backward,
        "I'm feeling nervous, can we go back?",
    ),
    (
        Emotion::Neutral,
        Direction::Forward,
        "I want to keep moving forward",
    ),
    (
        Emotion::Excited,
        Direction::Forward,
        "I'm excited to keep going forward!",
    ),
];

/// One plausible emotion/direction reading with the sentence the patient
/// wants to say.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Scenario {
    pub id: String,
    pub emotion: Emotion,
    pub direction: Direction,
    /// Classifier confidence for `emotion`, in [0, 1]
    pub emotion_confidence: f64,
    /// Classifier confidence for `direction`, in [0, 1]
    pub direction_confidence: f64,
    /// Sentence to speak and caption
    pub speech: String,
    /// Short description of the patient's state; names the fallback origin
    /// when the scenario was synthesized locally
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_notes: Option<String>,
    /// Model that produced the scenario ("fallback" for local synthesis)
    pub model_used: String,
    #[serde(default)]
    pub tokens_used: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_movement: Option<AvatarMovement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_style: Option<CaptionStyle>,
}

/// Input to scenario generation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ScenarioRequest {
    /// Extra context appended to the generation prompt
    #[serde(default)]
    pub context: Option<String>,
    /// Preferred emotion label
    #[serde(default)]
    pub emotion_hint: Option<String>,
    /// Preferred direction label
    #[serde(default)]
    pub direction_hint: Option<String>,
}

impl ScenarioRequest {
    /// Unknown labels resolve to `Neutral`; a blank hint counts as absent.
    pub fn emotion_hint(&self) -> Option<Emotion> {
        non_blank(&self.emotion_hint).map(Emotion::parse_or_neutral)
    }

    /// `None` when absent, blank or not a known direction. Callers that must
    /// reject unknown labels check [`ScenarioRequest::invalid_direction_hint`].
    pub fn direction_hint(&self) -> Option<Direction> {
        non_blank(&self.direction_hint).and_then(Direction::parse)
    }

    /// The raw direction hint when it is present but not a known label.
    pub fn invalid_direction_hint(&self) -> Option<&str> {
        non_blank(&self.direction_hint).filter(|hint| Direction::parse(hint).is_none())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// What the completion backend is told when asked for a single sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechPrompt {
    pub emotion: Emotion,
    pub direction: Direction,
    /// Classifier confidence in [0, 1]
    pub emotion_confidence: Option<f64>,
    /// Classifier confidence in [0, 1]
    pub direction_confidence: Option<f64>,
    pub context: Option<String>,
}

impl SpeechPrompt {
    pub fn new(emotion: Emotion, direction: Direction) -> Self {
        Self {
            emotion,
            direction,
            emotion_confidence: None,
            direction_confidence: None,
            context: None,
        }
    }
}

/// Avatar animation parameters derived from the emotion profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvatarMovement {
    pub animation: String,
    pub locomotion: String,
    pub direction: Direction,
    pub facial_expression: String,
    pub gesture: String,
    pub intensity: f64,
    pub speed: f64,
}

/// Caption styling derived from the emotion profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CaptionStyle {
    pub text: String,
    pub text_color: String,
    pub background_color: String,
    pub font_weight: String,
    pub animation: String,
    pub icon: String,
}

impl AvatarMovement {
    pub fn from_profile(profile: &EmotionProfile, direction: Direction) -> Self {
        let movement = profile.movement;
        Self {
            animation: movement.animation.to_string(),
            locomotion: direction.locomotion().to_string(),
            direction,
            facial_expression: movement.facial_expression.to_string(),
            gesture: movement.gesture.to_string(),
            intensity: movement.intensity,
            speed: movement.speed,
        }
    }
}

impl CaptionStyle {
    pub fn from_profile(profile: &EmotionProfile, text: &str) -> Self {
        let caption = profile.caption;
        Self {
            text: text.to_string(),
            text_color: caption.text_color.to_string(),
            background_color: caption.background_color.to_string(),
            font_weight: caption.font_weight.to_string(),
            animation: caption.animation.to_string(),
            icon: caption.icon.to_string(),
        }
    }
}

impl Scenario {
    /// Attach movement and caption records from the static profile table.
    pub fn enrich(mut self) -> Self {
        let profile = EmotionProfile::for_emotion(self.emotion);
        self.avatar_movement = Some(AvatarMovement::from_profile(profile, self.direction));
        self.caption_style = Some(CaptionStyle::from_profile(profile, &self.speech));
        self
    }

    /// Synthesize a scenario locally.
    ///
    /// Hints from the request are honoured; anything unset is drawn uniformly
    /// from the fixed vocabularies.
    pub fn fallback<R: Rng + ?Sized>(request: &ScenarioRequest, rng: &mut R) -> Self {
        let emotion = request
            .emotion_hint()
            .or_else(|| Emotion::ALL.choose(rng).copied())
            .unwrap_or(Emotion::Neutral);
        let direction = request
            .direction_hint()
            .or_else(|| Direction::ALL.choose(rng).copied())
            .unwrap_or(Direction::Stop);
        let now = Utc::now();

        Self {
            id: format!(
                "fallback_{}_{:04x}",
                now.format("%Y%m%d_%H%M%S"),
                rng.gen_range(0..=0xffff_u32)
            ),
            emotion,
            direction,
            emotion_confidence: round2(
                rng.gen_range(EMOTION_CONFIDENCE_RANGE.0..EMOTION_CONFIDENCE_RANGE.1),
            ),
            direction_confidence: round2(
                rng.gen_range(DIRECTION_CONFIDENCE_RANGE.0..DIRECTION_CONFIDENCE_RANGE.1),
            ),
            speech: fallback_speech(emotion, direction),
            context: format!("Fallback scenario - {emotion} patient wanting to {direction}"),
            medical_notes: Some("Generated locally due to API connectivity issues".to_string()),
            model_used: "fallback".to_string(),
            tokens_used: 0,
            generated_at: now,
            avatar_movement: None,
            caption_style: None,
        }
    }
}

/// Sentence for an (emotion, direction) pair without calling a model.
pub fn fallback_speech(emotion: Emotion, direction: Direction) -> String {
    CANNED_SPEECH
        .iter()
        .find(|(e, d, _)| *e == emotion && *d == direction)
        .map(|(_, _, speech)| (*speech).to_string())
        .unwrap_or_else(|| EmotionProfile::for_emotion(emotion).speech_for(direction))
}

/// Fixed scenarios for the list endpoint.
pub fn demo_scenarios() -> Vec<Scenario> {
    let now = Utc::now();
    let demo = |id: &str, emotion, direction, ec, dc, speech: &str, context: &str| Scenario {
        id: id.to_string(),
        emotion,
        direction,
        emotion_confidence: ec,
        direction_confidence: dc,
        speech: speech.to_string(),
        context: context.to_string(),
        medical_notes: None,
        model_used: "demo".to_string(),
        tokens_used: 0,
        generated_at: now,
        avatar_movement: None,
        caption_style: None,
    };

    vec![
        demo(
            "demo_1",
            Emotion::Calm,
            Direction::Forward,
            0.87,
            0.92,
            "I feel peaceful and ready to move forward",
            "Patient in relaxed state",
        ),
        demo(
            "demo_2",
            Emotion::Excited,
            Direction::Left,
            0.94,
            0.78,
            "I'm energized! Let's turn left and explore",
            "High energy state",
        ),
        demo(
            "demo_3",
            Emotion::Sad,
            Direction::Stop,
            0.76,
            0.85,
            "I'm feeling down right now, I need to stop here",
            "Low mood, needs support",
        ),
    ]
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
