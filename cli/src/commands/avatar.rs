use clap::Subcommand;
use serde_json::json;

use crate::util::{api_request, parse_json_object};

#[derive(Subcommand)]
pub enum AvatarCommands {
    /// Create an avatar from a preset
    Create {
        /// default_male, default_female or therapy_assistant
        #[arg(long, default_value = "default_female")]
        preset: String,
        /// Extra appearance settings as a JSON object
        #[arg(long)]
        customizations: Option<String>,
    },
    /// List avatars
    List,
    /// Show one avatar
    Info { id: String },
    /// List animation clips for an avatar
    Animations { id: String },
}

pub async fn run(api_url: &str, command: AvatarCommands) -> i32 {
    match command {
        AvatarCommands::Create {
            preset,
            customizations,
        } => {
            let mut body = json!({ "preset_type": preset });
            if let Some(raw) = customizations {
                body["customizations"] = parse_json_object("--customizations", &raw);
            }
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/avatars/create-preset",
                Some(body),
                &[],
            )
            .await
        }
        AvatarCommands::List => {
            api_request(api_url, reqwest::Method::GET, "/api/avatars", None, &[]).await
        }
        AvatarCommands::Info { id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/api/avatars/{id}"),
                None,
                &[],
            )
            .await
        }
        AvatarCommands::Animations { id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/api/avatars/{id}/animations"),
                None,
                &[],
            )
            .await
        }
    }
}
