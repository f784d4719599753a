pub mod avatar;
pub mod health;
pub mod pattern;
pub mod scenario;
pub mod speech;

use pixelpeak_core::emotion::{Direction, Emotion};

use crate::util::exit_error;

/// Reject labels the API would refuse before spending a request on them.
pub fn require_emotion(label: &str) -> Emotion {
    Emotion::parse(label).unwrap_or_else(|| {
        exit_error(
            &format!("Unknown emotion '{label}'"),
            Some("Use one of: calm, excited, sad, anxious, neutral, happy"),
        )
    })
}

pub fn require_direction(label: &str) -> Direction {
    Direction::parse(label).unwrap_or_else(|| {
        exit_error(
            &format!("Unknown direction '{label}'"),
            Some("Use one of: forward, backward, left, right, stop"),
        )
    })
}
