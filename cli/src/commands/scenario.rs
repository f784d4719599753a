use clap::Subcommand;
use serde_json::json;

use crate::commands::{require_direction, require_emotion};
use crate::util::api_request;

#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// List the canned demo scenarios
    List,
    /// Generate one scenario
    Generate {
        #[command(flatten)]
        hints: Hints,
    },
    /// Run the whole pipeline: scenario, speech and pattern storage
    Workflow {
        #[command(flatten)]
        hints: Hints,
    },
}

#[derive(clap::Args)]
pub struct Hints {
    /// Situation description passed to the model
    #[arg(long)]
    pub context: Option<String>,
    /// Preferred emotion (e.g. "calm", "anxious")
    #[arg(long)]
    pub emotion: Option<String>,
    /// Preferred direction (e.g. "forward", "left")
    #[arg(long)]
    pub direction: Option<String>,
}

impl Hints {
    fn body(&self) -> serde_json::Value {
        let mut body = json!({});
        if let Some(context) = &self.context {
            body["context"] = json!(context);
        }
        if let Some(emotion) = &self.emotion {
            body["emotion_hint"] = json!(require_emotion(emotion));
        }
        if let Some(direction) = &self.direction {
            body["direction_hint"] = json!(require_direction(direction));
        }
        body
    }
}

pub async fn run(api_url: &str, command: ScenarioCommands) -> i32 {
    match command {
        ScenarioCommands::List => {
            api_request(api_url, reqwest::Method::GET, "/api/scenarios", None, &[]).await
        }
        ScenarioCommands::Generate { hints } => {
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/generate-scenario",
                Some(hints.body()),
                &[],
            )
            .await
        }
        ScenarioCommands::Workflow { hints } => {
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/complete-workflow",
                Some(hints.body()),
                &[],
            )
            .await
        }
    }
}
