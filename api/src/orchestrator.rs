//! Scenario pipeline: obtain a scenario, enrich it from the emotion profile
//! table, then make best-effort side effects (speech, pattern storage,
//! scenario artifact). Later stages never unwind an earlier one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pixelpeak_core::patterns::PatternQuery;
use pixelpeak_core::provenance::ProvenanceMeta;
use pixelpeak_core::scenario::{Scenario, ScenarioRequest};
use pixelpeak_core::speech::{SpeechRequest, SpeechResult};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::clients::avatar::AvatarClient;
use crate::clients::completion::CompletionClient;
use crate::clients::http_client;
use crate::clients::speech::SpeechClient;
use crate::clients::vector::VectorStoreClient;
use crate::config::ServiceConfig;
use crate::degradation::HealthSnapshot;
use crate::storage::{ArtifactKind, ArtifactStore};

/// Scenario plus how it was produced.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub scenario_meta: ProvenanceMeta,
    /// Provenance of the pattern upsert
    pub pattern_meta: ProvenanceMeta,
}

/// Everything the full workflow produced.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkflowOutcome {
    pub scenario: Scenario,
    pub scenario_meta: ProvenanceMeta,
    pub speech: SpeechResult,
    pub speech_meta: ProvenanceMeta,
    pub pattern_meta: ProvenanceMeta,
    /// Stored scenario JSON, absent if it could not be written
    pub scenario_artifact_url: Option<String>,
    pub ready_for_vr: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceReport {
    pub available: bool,
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
}

/// Result of probing every vendor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    /// "healthy" when every vendor answered live, else "degraded"
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceReport>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.services.values().all(|s| s.available)
    }
}

/// Coordinates the four vendor clients. Clients are injected so tests can
/// point them at mock servers.
pub struct ScenarioOrchestrator {
    completion: Arc<CompletionClient>,
    speech: Arc<SpeechClient>,
    vector: Arc<VectorStoreClient>,
    avatar: Arc<AvatarClient>,
    store: ArtifactStore,
}

impl ScenarioOrchestrator {
    pub fn new(
        completion: Arc<CompletionClient>,
        speech: Arc<SpeechClient>,
        vector: Arc<VectorStoreClient>,
        avatar: Arc<AvatarClient>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            completion,
            speech,
            vector,
            avatar,
            store,
        }
    }

    /// Wire all four clients from configuration, sharing one HTTP client and
    /// artifact store.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let http = http_client();
        let store = ArtifactStore::new(&config.storage_root);
        Self::new(
            Arc::new(CompletionClient::new(
                http.clone(),
                config.completion.clone(),
                config.timeouts,
            )),
            Arc::new(SpeechClient::new(
                http.clone(),
                config.speech.clone(),
                config.timeouts,
                store.clone(),
            )),
            Arc::new(VectorStoreClient::new(
                http.clone(),
                config.vector.clone(),
                config.timeouts,
            )),
            Arc::new(AvatarClient::new(
                http,
                config.avatar.clone(),
                config.timeouts,
                store.clone(),
            )),
            store,
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn completion(&self) -> &CompletionClient {
        &self.completion
    }

    pub fn speech(&self) -> &SpeechClient {
        &self.speech
    }

    pub fn vector(&self) -> &VectorStoreClient {
        &self.vector
    }

    pub fn avatar(&self) -> &AvatarClient {
        &self.avatar
    }

    /// Stages 1 and 2, plus the pattern upsert.
    pub async fn generate_scenario(&self, request: &ScenarioRequest) -> ScenarioOutcome {
        let (scenario, scenario_meta) = self.obtain(request).await;
        let pattern_meta = self.store_pattern(&scenario).await;
        ScenarioOutcome {
            scenario,
            scenario_meta,
            pattern_meta,
        }
    }

    /// All stages: scenario, enrichment, speech, pattern storage and a
    /// persisted scenario artifact.
    pub async fn complete_workflow(&self, request: &ScenarioRequest) -> WorkflowOutcome {
        let (scenario, scenario_meta) = self.obtain(request).await;

        let speech_request = SpeechRequest {
            text: scenario.speech.clone(),
            emotion: scenario.emotion,
            voice_id: None,
        };
        let (speech, pattern_meta) = tokio::join!(
            self.speech.text_to_speech(&speech_request),
            self.store_pattern(&scenario),
        );
        let (speech, speech_meta) = speech.into_parts();

        let scenario_artifact_url = self.persist_scenario(&scenario, &speech).await;
        tracing::info!(
            scenario_id = %scenario.id,
            scenario_fallback = scenario_meta.is_fallback,
            speech_fallback = speech_meta.is_fallback,
            pattern_fallback = pattern_meta.is_fallback,
            "Workflow complete"
        );

        WorkflowOutcome {
            scenario,
            scenario_meta,
            speech,
            speech_meta,
            pattern_meta,
            scenario_artifact_url,
            ready_for_vr: true,
        }
    }

    /// Probe all four vendors concurrently.
    pub async fn probe_all(&self) -> HealthReport {
        let (completion, speech, vector, avatar) = tokio::join!(
            self.completion.health_check(),
            self.speech.health_check(),
            self.vector.health_check(),
            self.avatar.health_check(),
        );

        let services: BTreeMap<String, ServiceReport> = [
            (self.completion.health(), completion),
            (self.speech.health(), speech),
            (self.vector.health(), vector),
            (self.avatar.health(), avatar),
        ]
        .into_iter()
        .map(|(tracker, available)| {
            (
                tracker.service().as_str().to_string(),
                ServiceReport {
                    available,
                    snapshot: tracker.snapshot(),
                },
            )
        })
        .collect();

        let healthy = services.values().all(|s| s.available);
        HealthReport {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now(),
            services,
        }
    }

    async fn obtain(&self, request: &ScenarioRequest) -> (Scenario, ProvenanceMeta) {
        let (scenario, meta) = self.completion.generate_scenario(request).await.into_parts();
        (scenario.enrich(), meta)
    }

    async fn store_pattern(&self, scenario: &Scenario) -> ProvenanceMeta {
        let pattern = PatternQuery {
            emotion: scenario.emotion,
            direction: scenario.direction,
            context: scenario.context.clone(),
            emotion_confidence: Some(scenario.emotion_confidence),
            direction_confidence: Some(scenario.direction_confidence),
        };
        let extra = json!({
            "scenario_id": scenario.id,
            "speech": scenario.speech,
            "model_used": scenario.model_used,
        });
        self.vector
            .store_pattern(&scenario.id, &pattern, Some(extra))
            .await
            .into_parts()
            .1
    }

    async fn persist_scenario(&self, scenario: &Scenario, speech: &SpeechResult) -> Option<String> {
        let filename = format!("{}.json", scenario.id);
        let document = json!({
            "scenario": scenario,
            "speech": speech,
            "saved_at": Utc::now(),
        });
        let bytes = match serde_json::to_vec_pretty(&document) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "Could not serialize scenario artifact");
                return None;
            }
        };
        match self
            .store
            .write_new(ArtifactKind::Scenario, &filename, &bytes)
            .await
        {
            Ok(_) => Some(ArtifactStore::url(ArtifactKind::Scenario, &filename)),
            Err(err) => {
                tracing::warn!(file = %filename, error = %err, "Could not persist scenario artifact");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pixelpeak_core::emotion::{Direction, Emotion};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{AvatarConfig, CompletionConfig, SpeechConfig, Timeouts, VectorConfig};

    fn closed_url() -> String {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        format!("http://127.0.0.1:{port}")
    }

    fn orchestrator(
        completion_url: &str,
        speech_url: &str,
        vector_host: &str,
        root: &std::path::Path,
    ) -> ScenarioOrchestrator {
        let http = reqwest::Client::new();
        let timeouts = Timeouts::default();
        let store = ArtifactStore::new(root);
        ScenarioOrchestrator::new(
            Arc::new(CompletionClient::new(
                http.clone(),
                CompletionConfig {
                    api_key: Some("gsk_test".to_string()),
                    base_url: completion_url.to_string(),
                    model: "test-model".to_string(),
                    max_tokens: 500,
                    temperature: 0.7,
                },
                timeouts,
            )),
            Arc::new(SpeechClient::new(
                http.clone(),
                SpeechConfig {
                    api_key: Some("sk_test".to_string()),
                    base_url: speech_url.to_string(),
                    model_id: "eleven_monolingual_v1".to_string(),
                },
                timeouts,
                store.clone(),
            )),
            Arc::new(VectorStoreClient::new(
                http.clone(),
                VectorConfig {
                    api_key: Some("pcsk_test".to_string()),
                    index_host: Some(vector_host.to_string()),
                    dimension: 32,
                },
                timeouts,
            )),
            Arc::new(AvatarClient::new(
                http,
                AvatarConfig {
                    api_key: None,
                    base_url: closed_url(),
                    subdomain: "demo".to_string(),
                },
                timeouts,
                store.clone(),
            )),
            store,
        )
    }

    #[tokio::test]
    async fn workflow_survives_every_vendor_failing() {
        let dir = tempfile::tempdir().unwrap();
        let down = closed_url();
        let orchestrator = orchestrator(&down, &down, &down, dir.path());
        let request = ScenarioRequest {
            context: None,
            emotion_hint: Some("calm".to_string()),
            direction_hint: Some("forward".to_string()),
        };

        let outcome = orchestrator.complete_workflow(&request).await;

        assert!(outcome.scenario_meta.is_fallback);
        assert!(outcome.scenario.context.starts_with("Fallback scenario"));
        assert_eq!(outcome.scenario.emotion, Emotion::Calm);
        assert_eq!(outcome.scenario.direction, Direction::Forward);
        assert!(outcome.scenario.avatar_movement.is_some());
        assert!(outcome.scenario.caption_style.is_some());
        assert!(outcome.speech.success);
        assert!(!outcome.speech.supports_playback);
        assert!(outcome.speech_meta.is_fallback);
        assert!(outcome.pattern_meta.is_fallback);

        let artifact = outcome.scenario_artifact_url.expect("scenario persisted");
        let filename = artifact.trim_start_matches("/scenarios/");
        assert!(dir.path().join("scenarios").join(filename).exists());
    }

    #[tokio::test]
    async fn live_scenario_is_enriched_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content":
                    "{\"emotion\":\"excited\",\"direction\":\"left\",\"emotion_confidence\":0.9,\"direction_confidence\":0.8,\"speech\":\"Let's turn left!\"}"
                } }],
                "usage": { "total_tokens": 42 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = orchestrator(&server.uri(), &closed_url(), &server.uri(), dir.path());
        let outcome = orchestrator
            .generate_scenario(&ScenarioRequest::default())
            .await;

        assert!(!outcome.scenario_meta.is_fallback);
        assert!(!outcome.pattern_meta.is_fallback);
        let movement = outcome.scenario.avatar_movement.expect("enriched");
        assert_eq!(movement.locomotion, "turn_left");
        assert_eq!(
            outcome.scenario.caption_style.expect("caption").text,
            "Let's turn left!"
        );
    }

    #[tokio::test]
    async fn probe_all_reports_degraded_when_any_vendor_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let down = closed_url();
        let orchestrator = orchestrator(&server.uri(), &down, &down, dir.path());
        let report = orchestrator.probe_all().await;

        assert_eq!(report.status, "degraded");
        assert!(!report.is_healthy());
        assert!(report.services["groq"].available);
        assert!(!report.services["elevenlabs"].available);
        assert!(report.services["elevenlabs"].snapshot.health.fallback_engaged);
        assert_eq!(
            report.services["ready_player_me"].snapshot.health.last_error.as_deref(),
            Some("service not configured")
        );
    }
}
