use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::emotion::{Direction, Emotion};
use crate::scenario::round2;

/// Upper bound on records a synthetic similarity search returns.
pub const MOCK_RESULT_CAP: usize = 3;

/// A stored or queried EEG pattern description.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatternQuery {
    pub emotion: Emotion,
    pub direction: Direction,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub emotion_confidence: Option<f64>,
    #[serde(default)]
    pub direction_confidence: Option<f64>,
}

impl PatternQuery {
    /// Text representation fed to the embedder.
    pub fn embedding_text(&self) -> String {
        let confidence = match (self.emotion_confidence, self.direction_confidence) {
            (Some(e), Some(d)) => {
                format!(" with emotion confidence {e:.2} and direction confidence {d:.2}")
            }
            _ => String::new(),
        };
        format!(
            "Patient emotion is {}, movement intention is {}{}. {}",
            self.emotion, self.direction, confidence, self.context
        )
        .trim()
        .to_string()
    }
}

/// One match from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimilarPattern {
    pub id: String,
    /// Similarity in [0, 1]
    pub similarity_score: f64,
    pub emotion: Emotion,
    pub direction: Direction,
    pub context: String,
    #[serde(default)]
    pub emotion_confidence: Option<f64>,
    #[serde(default)]
    pub direction_confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Raw metadata; `source` is `"mock"` for synthetic records
    pub metadata: serde_json::Value,
}

/// A single stored vector and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatternRecord {
    pub id: String,
    #[serde(default)]
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Summary of the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: u32,
    pub index_fullness: f64,
    #[serde(default)]
    pub namespaces: serde_json::Value,
}

/// Canned pattern descriptions used to seed an empty index.
pub const SAMPLE_PATTERNS: &[(Emotion, Direction, &str)] = &[
    (
        Emotion::Calm,
        Direction::Forward,
        "Patient feeling peaceful, ready to progress",
    ),
    (
        Emotion::Excited,
        Direction::Left,
        "High energy, wants to explore left side",
    ),
    (
        Emotion::Sad,
        Direction::Stop,
        "Feeling down, needs emotional support",
    ),
    (
        Emotion::Calm,
        Direction::Right,
        "Thoughtful state, deliberate right turn",
    ),
    (
        Emotion::Excited,
        Direction::Forward,
        "Enthusiastic about moving ahead",
    ),
    (
        Emotion::Anxious,
        Direction::Backward,
        "Feeling nervous, wants to retreat",
    ),
    (
        Emotion::Neutral,
        Direction::Stop,
        "Resting state, no specific intention",
    ),
    (
        Emotion::Calm,
        Direction::Up,
        "Looking up with peaceful mindset",
    ),
    (
        Emotion::Excited,
        Direction::Down,
        "Energetic downward focus",
    ),
    (Emotion::Sad, Direction::Left, "Melancholy, turning away"),
];

/// Synthetic similarity results: between 1 and `min(top_k, 3)` records,
/// scores in [0.75, 0.95].
pub fn mock_similar_patterns<R: Rng + ?Sized>(
    query: &PatternQuery,
    top_k: usize,
    rng: &mut R,
) -> Vec<SimilarPattern> {
    let count = top_k.clamp(1, MOCK_RESULT_CAP);
    let timestamp = Utc::now().to_rfc3339();

    (0..count)
        .map(|i| SimilarPattern {
            id: format!("pattern_{}", i + 1),
            similarity_score: (rng.gen_range(0.75..0.95_f64) * 1000.0).round() / 1000.0,
            emotion: query.emotion,
            direction: query.direction,
            context: format!(
                "Similar {} patient wanting to {}",
                query.emotion, query.direction
            ),
            emotion_confidence: Some(round2(rng.gen_range(0.70..0.95))),
            direction_confidence: Some(round2(rng.gen_range(0.70..0.95))),
            timestamp: Some(timestamp.clone()),
            metadata: json!({ "source": "mock" }),
        })
        .collect()
}

/// Synthetic index statistics.
pub fn mock_index_stats(dimension: u32) -> IndexStats {
    IndexStats {
        total_vector_count: 25,
        dimension,
        index_fullness: 0.1,
        namespaces: json!({}),
    }
}
