use clap::Subcommand;
use serde_json::json;

use crate::commands::require_emotion;
use crate::util::{api_request, exit_error};

#[derive(Subcommand)]
pub enum SpeechCommands {
    /// Synthesize a sentence with an emotion's voice
    Say {
        /// Text to speak
        text: String,
        #[arg(long, default_value = "neutral")]
        emotion: String,
        /// Override the emotion's default voice
        #[arg(long)]
        voice_id: Option<String>,
    },
    /// List available voices
    Voices,
}

pub async fn run(api_url: &str, command: SpeechCommands) -> i32 {
    match command {
        SpeechCommands::Say {
            text,
            emotion,
            voice_id,
        } => {
            if text.trim().is_empty() {
                exit_error("text must not be empty", None);
            }
            let mut body = json!({
                "text": text,
                "emotion": require_emotion(&emotion),
            });
            if let Some(voice_id) = voice_id {
                body["voice_id"] = json!(voice_id);
            }
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/process-speech",
                Some(body),
                &[],
            )
            .await
        }
        SpeechCommands::Voices => {
            api_request(api_url, reqwest::Method::GET, "/api/voices", None, &[]).await
        }
    }
}
