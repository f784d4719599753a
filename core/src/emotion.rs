use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Emotional state reported by the signal classifier.
///
/// Closed vocabulary. Labels that fall outside it resolve to `Neutral`
/// when looked up through [`EmotionProfile::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Calm,
    Excited,
    Sad,
    Anxious,
    Neutral,
    Happy,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Calm,
        Emotion::Excited,
        Emotion::Sad,
        Emotion::Anxious,
        Emotion::Neutral,
        Emotion::Happy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Calm => "calm",
            Emotion::Excited => "excited",
            Emotion::Sad => "sad",
            Emotion::Anxious => "anxious",
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
        }
    }

    /// Parse a free-form label, trimming and lowercasing first.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|emotion| emotion.as_str() == normalized)
    }

    /// Parse a label, resolving anything unknown to `Neutral`.
    pub fn parse_or_neutral(label: &str) -> Self {
        Self::parse(label).unwrap_or(Emotion::Neutral)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Movement intention reported by the signal classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 7] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
        Direction::Stop,
        Direction::Up,
        Direction::Down,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Stop => "stop",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Verb phrase used when a direction is spoken aloud.
    pub fn phrase(self) -> &'static str {
        match self {
            Direction::Forward => "move forward",
            Direction::Backward => "go back",
            Direction::Left => "turn left",
            Direction::Right => "turn right",
            Direction::Stop => "stop here",
            Direction::Up => "look up",
            Direction::Down => "look down",
        }
    }

    /// Avatar locomotion clip that plays this intention.
    pub fn locomotion(self) -> &'static str {
        match self {
            Direction::Forward => "walk_forward",
            Direction::Backward => "walk_backward",
            Direction::Left => "turn_left",
            Direction::Right => "turn_right",
            Direction::Stop => "idle",
            Direction::Up => "look_up",
            Direction::Down => "look_down",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|direction| direction.as_str() == normalized)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// Speech-synthesis parameters for one emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    pub voice_id: &'static str,
    pub stability: f64,
    pub similarity_boost: f64,
}

/// Avatar animation parameters for one emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementProfile {
    pub animation: &'static str,
    pub facial_expression: &'static str,
    pub gesture: &'static str,
    /// 0.0 (still) to 1.0 (most animated)
    pub intensity: f64,
    /// Playback speed multiplier
    pub speed: f64,
}

/// Caption styling for one emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionProfile {
    pub text_color: &'static str,
    pub background_color: &'static str,
    pub font_weight: &'static str,
    pub animation: &'static str,
    pub icon: &'static str,
}

/// Static per-emotion configuration: voice, animation, captions and canned
/// speech templates. Built once into the binary and shared by every request.
#[derive(Debug)]
pub struct EmotionProfile {
    pub emotion: Emotion,
    pub voice: VoiceProfile,
    pub movement: MovementProfile,
    pub caption: CaptionProfile,
    /// Templates contain a `{direction}` placeholder filled with
    /// [`Direction::phrase`].
    pub speech_templates: &'static [&'static str],
}

const RACHEL: &str = "21m00Tcm4TlvDq8ikWAM";
const DREW: &str = "29vD33N1CtxCmqQRPOHJ";
const SARAH: &str = "EXAVITQu4vr4xnSDxMaL";
const GRACE: &str = "oWAxZDx7w5VEj9dCyTzz";

static PROFILES: [EmotionProfile; 6] = [
    EmotionProfile {
        emotion: Emotion::Calm,
        voice: VoiceProfile {
            voice_id: RACHEL,
            stability: 0.85,
            similarity_boost: 0.70,
        },
        movement: MovementProfile {
            animation: "calm_idle",
            facial_expression: "soft_smile",
            gesture: "open_palms",
            intensity: 0.3,
            speed: 0.8,
        },
        caption: CaptionProfile {
            text_color: "#E0F7FA",
            background_color: "#006064",
            font_weight: "normal",
            animation: "fade",
            icon: "leaf",
        },
        speech_templates: &[
            "I feel calm and want to {direction}",
            "Feeling peaceful, I would like to {direction}",
        ],
    },
    EmotionProfile {
        emotion: Emotion::Excited,
        voice: VoiceProfile {
            voice_id: DREW,
            stability: 0.60,
            similarity_boost: 0.85,
        },
        movement: MovementProfile {
            animation: "excited_bounce",
            facial_expression: "wide_smile",
            gesture: "raised_arms",
            intensity: 0.9,
            speed: 1.3,
        },
        caption: CaptionProfile {
            text_color: "#FFF3E0",
            background_color: "#E65100",
            font_weight: "bold",
            animation: "pop",
            icon: "spark",
        },
        speech_templates: &[
            "I'm excited! Let's {direction}",
            "I have so much energy, I want to {direction}",
        ],
    },
    EmotionProfile {
        emotion: Emotion::Sad,
        voice: VoiceProfile {
            voice_id: SARAH,
            stability: 0.90,
            similarity_boost: 0.75,
        },
        movement: MovementProfile {
            animation: "sad_slump",
            facial_expression: "downcast",
            gesture: "lowered_head",
            intensity: 0.2,
            speed: 0.6,
        },
        caption: CaptionProfile {
            text_color: "#E8EAF6",
            background_color: "#283593",
            font_weight: "light",
            animation: "slow_fade",
            icon: "cloud",
        },
        speech_templates: &[
            "I'm feeling sad but I'll {direction}",
            "It's a hard moment, but I want to {direction}",
        ],
    },
    EmotionProfile {
        emotion: Emotion::Anxious,
        voice: VoiceProfile {
            voice_id: GRACE,
            stability: 0.70,
            similarity_boost: 0.80,
        },
        movement: MovementProfile {
            animation: "anxious_fidget",
            facial_expression: "furrowed_brow",
            gesture: "hand_wringing",
            intensity: 0.6,
            speed: 1.1,
        },
        caption: CaptionProfile {
            text_color: "#FFFDE7",
            background_color: "#F57F17",
            font_weight: "medium",
            animation: "shake",
            icon: "alert",
        },
        speech_templates: &[
            "I'm anxious but trying to {direction}",
            "I feel a little nervous, can we {direction}?",
        ],
    },
    EmotionProfile {
        emotion: Emotion::Neutral,
        voice: VoiceProfile {
            voice_id: RACHEL,
            stability: 0.75,
            similarity_boost: 0.75,
        },
        movement: MovementProfile {
            animation: "neutral_idle",
            facial_expression: "relaxed",
            gesture: "none",
            intensity: 0.4,
            speed: 1.0,
        },
        caption: CaptionProfile {
            text_color: "#FFFFFF",
            background_color: "#424242",
            font_weight: "normal",
            animation: "none",
            icon: "dot",
        },
        speech_templates: &["I want to {direction}"],
    },
    EmotionProfile {
        emotion: Emotion::Happy,
        voice: VoiceProfile {
            voice_id: DREW,
            stability: 0.65,
            similarity_boost: 0.80,
        },
        movement: MovementProfile {
            animation: "happy_sway",
            facial_expression: "smile",
            gesture: "wave",
            intensity: 0.7,
            speed: 1.1,
        },
        caption: CaptionProfile {
            text_color: "#F1F8E9",
            background_color: "#2E7D32",
            font_weight: "semibold",
            animation: "bounce",
            icon: "sun",
        },
        speech_templates: &[
            "I'm happy and ready to {direction}",
            "This feels good, let's {direction}",
        ],
    },
];

impl EmotionProfile {
    pub fn for_emotion(emotion: Emotion) -> &'static EmotionProfile {
        PROFILES
            .iter()
            .find(|profile| profile.emotion == emotion)
            .unwrap_or(&PROFILES[4])
    }

    /// Look up a profile by free-form label. Unknown labels resolve to the
    /// `neutral` entry.
    pub fn lookup(label: &str) -> &'static EmotionProfile {
        Self::for_emotion(Emotion::parse_or_neutral(label))
    }

    pub fn all() -> &'static [EmotionProfile] {
        &PROFILES
    }

    /// Render the first speech template for a direction.
    pub fn speech_for(&self, direction: Direction) -> String {
        self.speech_templates
            .first()
            .copied()
            .unwrap_or("I want to {direction}")
            .replace("{direction}", direction.phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_emotion_has_a_complete_profile() {
        for emotion in Emotion::ALL {
            let profile = EmotionProfile::for_emotion(emotion);
            assert_eq!(profile.emotion, emotion);
            assert!(!profile.movement.animation.is_empty());
            assert!(!profile.caption.text_color.is_empty());
            assert!(!profile.speech_templates.is_empty());
            assert!(
                profile
                    .speech_templates
                    .iter()
                    .all(|t| t.contains("{direction}"))
            );
        }
    }

    #[test]
    fn unknown_label_resolves_to_neutral() {
        assert_eq!(EmotionProfile::lookup("furious").emotion, Emotion::Neutral);
        assert_eq!(EmotionProfile::lookup("").emotion, Emotion::Neutral);
        assert_eq!(EmotionProfile::lookup("  CALM ").emotion, Emotion::Calm);
    }

    #[test]
    fn labels_round_trip_through_serde_names() {
        for emotion in Emotion::ALL {
            let json = serde_json::to_string(&emotion).expect("serialize emotion");
            assert_eq!(json, format!("\"{}\"", emotion.as_str()));
        }
        assert_eq!("Left".parse::<Direction>(), Ok(Direction::Left));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn speech_for_fills_direction_phrase() {
        let speech = EmotionProfile::for_emotion(Emotion::Sad).speech_for(Direction::Backward);
        assert_eq!(speech, "I'm feeling sad but I'll go back");
    }
}
