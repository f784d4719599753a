use chrono::Utc;
use pixelpeak_core::avatar::{
    AnimationClip, AvatarPreset, AvatarRecord, AvatarSummary, MODEL_HOST, default_animations,
    demo_avatars,
};
use pixelpeak_core::provenance::CapabilityResult;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{CapabilityError, endpoint, is_safe_id, read_json, require_key, send};
use crate::config::{AvatarConfig, Timeouts};
use crate::degradation::{HealthTracker, Service};
use crate::storage::{ArtifactKind, ArtifactStore};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteAvatar {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl RemoteAvatar {
    fn into_summary(self) -> AvatarSummary {
        AvatarSummary {
            model_url: Some(AvatarRecord::model_url(&self.id)),
            name: self.name.unwrap_or_else(|| format!("Avatar {}", self.id)),
            created_at: self.created_at,
            status: self.status.unwrap_or_else(|| "ready".to_string()),
            avatar_id: self.id,
        }
    }
}

/// Avatar asset client. Created avatar records are also written as JSON to
/// the artifact store's `avatars/` directory.
pub struct AvatarClient {
    http: reqwest::Client,
    config: AvatarConfig,
    timeouts: Timeouts,
    health: HealthTracker,
    store: ArtifactStore,
}

impl AvatarClient {
    pub fn new(
        http: reqwest::Client,
        config: AvatarConfig,
        timeouts: Timeouts,
        store: ArtifactStore,
    ) -> Self {
        let health = if config.api_key.is_some() {
            HealthTracker::new(Service::Avatar)
        } else {
            HealthTracker::unconfigured(Service::Avatar)
        };
        Self {
            http,
            config,
            timeouts,
            health,
            store,
        }
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Probe `GET /applications`.
    pub async fn health_check(&self) -> bool {
        let Some(key) = self.config.api_key.as_deref() else {
            return false;
        };
        self.health
            .probe(|| async {
                let request = self
                    .http
                    .get(format!("{}/applications", self.config.base_url))
                    .bearer_auth(key);
                send(request, self.timeouts.probe, "applications")
                    .await
                    .map(|_| ())
            })
            .await
    }

    /// Create an avatar from a named preset.
    ///
    /// The fallback record has a synthetic id and a model URL that does not
    /// resolve; `is_fallback` marks it.
    pub async fn create_preset_avatar(
        &self,
        preset: AvatarPreset,
        customizations: Option<Value>,
    ) -> CapabilityResult<AvatarRecord> {
        let appearance = preset.appearance();
        let customizations = customizations.unwrap_or_else(|| json!({}));

        let outcome = self
            .health
            .attempt("create_preset_avatar", || async {
                let key = require_key(&self.config.api_key)?;
                let body = json!({
                    "data": {
                        "partner": self.config.subdomain,
                        "bodyType": "fullbody",
                        "gender": appearance.gender,
                        "assets": customizations,
                    }
                });
                let request = self
                    .http
                    .post(format!("{}/avatars", self.config.base_url))
                    .bearer_auth(key)
                    .json(&body);
                let response = send(request, self.timeouts.call, "avatars").await?;
                let created: Envelope<RemoteAvatar> =
                    read_json(response, self.timeouts.call).await?;
                // The id becomes part of a local file name.
                if !is_safe_id(&created.data.id) {
                    return Err(CapabilityError::MalformedResponse(format!(
                        "unusable avatar id {:?}",
                        created.data.id
                    )));
                }
                Ok(created.data.id)
            })
            .await;

        let now = Utc::now();
        let (record, reason) = match outcome {
            Ok(avatar_id) => (
                AvatarRecord {
                    avatar_url: AvatarRecord::model_url(&avatar_id),
                    avatar_id,
                    local_path: None,
                    preset_type: preset,
                    appearance,
                    customizations,
                    created_at: now,
                    model_format: "glb".to_string(),
                    animations_included: true,
                    ready_for_vr: true,
                    is_fallback: false,
                },
                None,
            ),
            Err(reason) => {
                let avatar_id = format!(
                    "fallback_{}_{}_{}",
                    appearance.gender,
                    appearance.style,
                    &Uuid::new_v4().simple().to_string()[..8]
                );
                (
                    AvatarRecord {
                        avatar_url: format!("{MODEL_HOST}/fallback.glb"),
                        avatar_id,
                        local_path: None,
                        preset_type: preset,
                        appearance,
                        customizations,
                        created_at: now,
                        model_format: "glb".to_string(),
                        animations_included: false,
                        ready_for_vr: false,
                        is_fallback: true,
                    },
                    Some(reason),
                )
            }
        };

        let record = self.persist(record).await;
        match reason {
            None => CapabilityResult::live(record),
            Some(reason) => CapabilityResult::fallback(record, reason),
        }
    }

    pub async fn list_avatars(&self) -> CapabilityResult<Vec<AvatarSummary>> {
        let outcome = self
            .health
            .attempt("list_avatars", || async {
                let key = require_key(&self.config.api_key)?;
                let request = self
                    .http
                    .get(format!("{}/avatars", self.config.base_url))
                    .bearer_auth(key);
                let response = send(request, self.timeouts.call, "avatars").await?;
                let listed: Envelope<Vec<RemoteAvatar>> =
                    read_json(response, self.timeouts.call).await?;
                Ok(listed
                    .data
                    .into_iter()
                    .map(RemoteAvatar::into_summary)
                    .collect::<Vec<_>>())
            })
            .await;

        match outcome {
            Ok(avatars) => CapabilityResult::live(avatars),
            Err(reason) => CapabilityResult::fallback(demo_avatars(), reason),
        }
    }

    /// Details for one avatar. A 404 answers with a synthetic summary.
    pub async fn avatar_info(&self, avatar_id: &str) -> CapabilityResult<AvatarSummary> {
        let outcome = self
            .health
            .attempt("avatar_info", || async {
                let key = require_key(&self.config.api_key)?;
                let url = endpoint(&self.config.base_url, &["avatars", avatar_id])?;
                let request = self.http.get(url).bearer_auth(key);
                let response =
                    send(request, self.timeouts.call, &format!("avatar {avatar_id}")).await?;
                let found: Envelope<RemoteAvatar> =
                    read_json(response, self.timeouts.call).await?;
                Ok(found.data.into_summary())
            })
            .await;

        match outcome {
            Ok(summary) => CapabilityResult::live(summary),
            Err(reason) => CapabilityResult::fallback(
                AvatarSummary {
                    avatar_id: avatar_id.to_string(),
                    name: "Mock Avatar".to_string(),
                    created_at: Some(Utc::now().to_rfc3339()),
                    status: "ready".to_string(),
                    model_url: None,
                },
                reason,
            ),
        }
    }

    /// Delete one avatar. The payload says whether the backend confirmed it.
    pub async fn delete_avatar(&self, avatar_id: &str) -> CapabilityResult<bool> {
        let outcome = self
            .health
            .attempt("delete_avatar", || async {
                let key = require_key(&self.config.api_key)?;
                let url = endpoint(&self.config.base_url, &["avatars", avatar_id])?;
                let request = self.http.delete(url).bearer_auth(key);
                send(request, self.timeouts.call, &format!("avatar {avatar_id}")).await?;
                Ok(())
            })
            .await;

        match outcome {
            Ok(()) => CapabilityResult::live(true),
            Err(reason) => CapabilityResult::fallback(false, reason),
        }
    }

    /// Animation clips available for an avatar. Served from the built-in
    /// catalogue; no network call.
    pub fn avatar_animations(&self, _avatar_id: &str) -> Vec<AnimationClip> {
        default_animations()
    }

    async fn persist(&self, mut record: AvatarRecord) -> AvatarRecord {
        let filename = format!("avatar_{}.json", record.avatar_id);
        let bytes = match serde_json::to_vec_pretty(&record) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "Could not serialize avatar record");
                return record;
            }
        };
        match self
            .store
            .write_new(ArtifactKind::Avatar, &filename, &bytes)
            .await
        {
            Ok(_) => {
                record.local_path = Some(ArtifactStore::url(ArtifactKind::Avatar, &filename));
            }
            Err(err) => {
                tracing::warn!(file = %filename, error = %err, "Could not persist avatar record");
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(base_url: &str, api_key: Option<&str>, root: &std::path::Path) -> AvatarClient {
        AvatarClient::new(
            reqwest::Client::new(),
            AvatarConfig {
                api_key: api_key.map(str::to_string),
                base_url: base_url.to_string(),
                subdomain: "pixelpeak".to_string(),
            },
            Timeouts::default(),
            ArtifactStore::new(root),
        )
    }

    #[tokio::test]
    async fn preset_avatar_is_created_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/avatars"))
            .and(header("authorization", "Bearer sk_test"))
            .and(body_partial_json(json!({
                "data": { "partner": "pixelpeak", "gender": "male" }
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "av123" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri(), Some("sk_test"), dir.path())
            .create_preset_avatar(AvatarPreset::DefaultMale, None)
            .await;

        assert!(!result.is_fallback());
        let record = result.payload();
        assert_eq!(record.avatar_id, "av123");
        assert_eq!(record.avatar_url, "https://models.readyplayer.me/av123.glb");
        assert_eq!(record.local_path.as_deref(), Some("/avatars/avatar_av123.json"));
        assert!(dir.path().join("avatars/avatar_av123.json").exists());
    }

    #[tokio::test]
    async fn unreachable_backend_yields_flagged_synthetic_avatar() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/avatars"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());

        let first = client
            .create_preset_avatar(AvatarPreset::TherapyAssistant, Some(json!({ "hair": 3 })))
            .await;
        let second = client
            .create_preset_avatar(AvatarPreset::TherapyAssistant, None)
            .await;

        for result in [&first, &second] {
            assert!(result.is_fallback());
            let record = result.payload();
            assert!(record.is_fallback);
            assert!(record.avatar_id.starts_with("fallback_female_professional_"));
            assert!(record.avatar_url.ends_with("fallback.glb"));
        }
        assert_ne!(first.payload().avatar_id, second.payload().avatar_id);
        assert_eq!(first.payload().customizations["hair"], 3);
    }

    #[tokio::test]
    async fn missing_avatar_answers_with_mock_summary() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/avatars/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());

        for _ in 0..2 {
            let info = client.avatar_info("ghost").await;
            assert!(info.is_fallback());
            assert!(info.fallback_reason().unwrap().starts_with("ResourceNotFound"));
            assert_eq!(info.payload().avatar_id, "ghost");
        }
    }

    #[tokio::test]
    async fn avatar_id_stays_inside_the_avatars_path() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());

        client.delete_avatar("../applications/app1").await;
        client.avatar_info("../applications").await;

        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(
            paths,
            vec!["/avatars/..%2Fapplications%2Fapp1", "/avatars/..%2Fapplications"]
        );
    }

    #[tokio::test]
    async fn vendor_id_with_path_separators_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/avatars"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "data": { "id": "../../escaped" } })),
            )
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());

        let result = client
            .create_preset_avatar(AvatarPreset::DefaultFemale, None)
            .await;

        assert!(result.is_fallback());
        assert!(result.fallback_reason().unwrap().starts_with("MalformedResponse"));
        assert!(result.payload().avatar_id.starts_with("fallback_"));
        assert!(!client.health().current().fallback_engaged);
        let stored: Vec<String> = std::fs::read_dir(dir.path().join("avatars"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with("avatar_fallback_"));
    }

    #[tokio::test]
    async fn listing_without_key_serves_demo_avatars() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("http://127.0.0.1:9", None, dir.path());
        assert!(!client.health_check().await);
        let listed = client.list_avatars().await;
        assert!(listed.is_fallback());
        assert_eq!(listed.payload().len(), 2);
        assert_eq!(client.avatar_animations("any").len(), 5);
    }

    #[tokio::test]
    async fn live_listing_maps_remote_fields() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/avatars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "a1", "name": "Guide", "createdAt": "2026-01-01T00:00:00Z" }]
            })))
            .mount(&server)
            .await;

        let listed = client(&server.uri(), Some("sk_test"), dir.path())
            .list_avatars()
            .await;
        assert!(!listed.is_fallback());
        let avatar = &listed.payload()[0];
        assert_eq!(avatar.name, "Guide");
        assert_eq!(avatar.status, "ready");
        assert_eq!(avatar.model_url.as_deref(), Some("https://models.readyplayer.me/a1.glb"));
    }
}
