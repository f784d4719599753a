use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_GROQ_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_ELEVENLABS_MODEL_ID: &str = "eleven_monolingual_v1";
const DEFAULT_READY_PLAYER_ME_BASE_URL: &str = "https://api.readyplayer.me/v1";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8080";

/// Chat-completion backend (OpenAI-compatible).
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Text-to-speech backend.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_id: String,
}

/// Vector index data plane.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    pub api_key: Option<String>,
    /// Index host, e.g. `https://pixelpeak-eeg-patterns-abc123.svc.pinecone.io`
    pub index_host: Option<String>,
    pub dimension: usize,
}

/// Avatar asset backend.
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub subdomain: String,
}

/// Upper bounds for vendor calls. No call may block longer than these.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Health probes
    pub probe: Duration,
    /// Ordinary JSON calls
    pub call: Duration,
    /// Speech synthesis, which streams audio
    pub speech: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(8),
            call: Duration::from_secs(20),
            speech: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub storage_root: PathBuf,
    pub cors_origins: Vec<String>,
    pub completion: CompletionConfig,
    pub speech: SpeechConfig,
    pub vector: VectorConfig,
    pub avatar: AvatarConfig,
    pub timeouts: Timeouts,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let secs = |key: &str, default: u64, max: u64| {
            let value = get(key)
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(default);
            Duration::from_secs(value.clamp(1, max))
        };

        let cors_origins = get("PIXELPEAK_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            storage_root: get("PIXELPEAK_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            cors_origins,
            completion: CompletionConfig {
                api_key: get("GROQ_API_KEY"),
                base_url: base_url(get("GROQ_BASE_URL"), DEFAULT_GROQ_BASE_URL),
                model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                max_tokens: get("GROQ_MAX_TOKENS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
                temperature: get("GROQ_TEMPERATURE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.7),
            },
            speech: SpeechConfig {
                api_key: get("ELEVENLABS_API_KEY"),
                base_url: base_url(get("ELEVENLABS_BASE_URL"), DEFAULT_ELEVENLABS_BASE_URL),
                model_id: get("ELEVENLABS_MODEL_ID")
                    .unwrap_or_else(|| DEFAULT_ELEVENLABS_MODEL_ID.to_string()),
            },
            vector: VectorConfig {
                api_key: get("PINECONE_API_KEY"),
                index_host: get("PINECONE_INDEX_HOST")
                    .map(|host| base_url(Some(host), ""))
                    .filter(|host| !host.is_empty()),
                dimension: get("PINECONE_DIMENSION")
                    .and_then(|v| v.parse().ok())
                    .filter(|d| *d > 0)
                    .unwrap_or(384),
            },
            avatar: AvatarConfig {
                api_key: get("READY_PLAYER_ME_API_KEY"),
                base_url: base_url(
                    get("READY_PLAYER_ME_BASE_URL"),
                    DEFAULT_READY_PLAYER_ME_BASE_URL,
                ),
                subdomain: get("READY_PLAYER_ME_SUBDOMAIN").unwrap_or_else(|| "demo".to_string()),
            },
            timeouts: Timeouts {
                probe: secs("PIXELPEAK_PROBE_TIMEOUT_SECS", 8, 10),
                call: secs("PIXELPEAK_CALL_TIMEOUT_SECS", 20, 30),
                speech: secs("PIXELPEAK_SPEECH_TIMEOUT_SECS", 30, 60),
            },
        }
    }

    /// Which vendor keys are present and carry the vendor's key prefix.
    pub fn api_key_status(&self) -> BTreeMap<&'static str, bool> {
        let looks_like = |key: &Option<String>, prefix: &str| {
            key.as_deref().is_some_and(|k| k.starts_with(prefix))
        };
        BTreeMap::from([
            ("groq", looks_like(&self.completion.api_key, "gsk_")),
            ("elevenlabs", looks_like(&self.speech.api_key, "sk_")),
            ("pinecone", looks_like(&self.vector.api_key, "pcsk_")),
            ("ready_player_me", looks_like(&self.avatar.api_key, "sk_")),
        ])
    }
}

/// Accept a configured base URL only if it parses; strip trailing slashes.
fn base_url(configured: Option<String>, default: &str) -> String {
    match configured {
        Some(raw) => match Url::parse(&raw) {
            Ok(_) => raw.trim_end_matches('/').to_string(),
            Err(err) => {
                tracing::warn!(url = %raw, error = %err, "Ignoring invalid base URL");
                default.to_string()
            }
        },
        None => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage_root, PathBuf::from("data"));
        assert_eq!(config.completion.base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(config.completion.max_tokens, 500);
        assert!(config.completion.api_key.is_none());
        assert!(config.vector.index_host.is_none());
        assert_eq!(config.vector.dimension, 384);
        assert_eq!(config.timeouts.probe, Duration::from_secs(8));
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "http://localhost:8080"]
        );
    }

    #[test]
    fn timeouts_are_clamped_to_bounds() {
        let config = config_from(&[
            ("PIXELPEAK_PROBE_TIMEOUT_SECS", "600"),
            ("PIXELPEAK_CALL_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(config.timeouts.probe, Duration::from_secs(10));
        assert_eq!(config.timeouts.call, Duration::from_secs(1));
    }

    #[test]
    fn invalid_base_url_falls_back_to_default_and_trailing_slash_is_stripped() {
        let config = config_from(&[
            ("GROQ_BASE_URL", "not a url"),
            ("ELEVENLABS_BASE_URL", "http://localhost:9000/v1/"),
        ]);
        assert_eq!(config.completion.base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(config.speech.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn api_key_status_checks_vendor_prefixes() {
        let config = config_from(&[
            ("GROQ_API_KEY", "gsk_abc"),
            ("ELEVENLABS_API_KEY", "wrong"),
            ("PINECONE_API_KEY", "pcsk_abc"),
        ]);
        let status = config.api_key_status();
        assert_eq!(status["groq"], true);
        assert_eq!(status["elevenlabs"], false);
        assert_eq!(status["pinecone"], true);
        assert_eq!(status["ready_player_me"], false);
    }
}
