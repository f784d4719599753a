use clap::Subcommand;
use serde_json::json;

use crate::commands::{require_direction, require_emotion};
use crate::util::api_request;

#[derive(Subcommand)]
pub enum PatternCommands {
    /// Find stored patterns similar to an emotion/direction pair
    Similar {
        #[arg(long)]
        emotion: String,
        #[arg(long)]
        direction: String,
        #[arg(long, default_value = "")]
        context: String,
        /// Maximum matches (1-20)
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Minimum similarity score (0-1)
        #[arg(long, default_value_t = 0.7)]
        min_score: f64,
    },
    /// Show vector index statistics
    Stats,
    /// Fetch one stored pattern
    Get { id: String },
    /// Delete one stored pattern
    Delete { id: String },
    /// List stored patterns with an emotion
    ByEmotion {
        emotion: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

pub async fn run(api_url: &str, command: PatternCommands) -> i32 {
    match command {
        PatternCommands::Similar {
            emotion,
            direction,
            context,
            top_k,
            min_score,
        } => {
            let body = json!({
                "emotion": require_emotion(&emotion),
                "direction": require_direction(&direction),
                "context": context,
                "top_k": top_k,
                "min_score": min_score,
            });
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/similar-patterns",
                Some(body),
                &[],
            )
            .await
        }
        PatternCommands::Stats => {
            api_request(api_url, reqwest::Method::GET, "/api/patterns/stats", None, &[]).await
        }
        PatternCommands::Get { id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/api/patterns/{id}"),
                None,
                &[],
            )
            .await
        }
        PatternCommands::Delete { id } => {
            api_request(
                api_url,
                reqwest::Method::DELETE,
                &format!("/api/patterns/{id}"),
                None,
                &[],
            )
            .await
        }
        PatternCommands::ByEmotion { emotion, limit } => {
            let emotion = require_emotion(&emotion);
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/api/patterns/by-emotion/{emotion}"),
                None,
                &[("limit", limit.to_string())],
            )
            .await
        }
    }
}
