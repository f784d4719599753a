use chrono::{DateTime, Utc};
use pixelpeak_core::emotion::{Emotion, EmotionProfile};
use pixelpeak_core::provenance::CapabilityResult;
use pixelpeak_core::speech::{
    SpeechRequest, SpeechResult, VoiceInfo, default_voices, duration_estimate,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::{CapabilityError, endpoint, read_json, require_key, send};
use crate::config::{SpeechConfig, Timeouts};
use crate::degradation::{HealthTracker, Service};
use crate::storage::{ArtifactKind, ArtifactStore, NewArtifact, artifact_name};

#[derive(Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

/// Stored audio file.
struct Synthesized {
    filename: String,
    file_size: u64,
}

/// Text-to-speech client. Audio and fallback placeholders land in the
/// artifact store's `audio/` directory.
pub struct SpeechClient {
    http: reqwest::Client,
    config: SpeechConfig,
    timeouts: Timeouts,
    health: HealthTracker,
    store: ArtifactStore,
}

impl SpeechClient {
    pub fn new(
        http: reqwest::Client,
        config: SpeechConfig,
        timeouts: Timeouts,
        store: ArtifactStore,
    ) -> Self {
        let health = if config.api_key.is_some() {
            HealthTracker::new(Service::Speech)
        } else {
            HealthTracker::unconfigured(Service::Speech)
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

    /// Probe `GET /voices`.
    pub async fn health_check(&self) -> bool {
        let Some(key) = self.config.api_key.as_deref() else {
            return false;
        };
        self.health
            .probe(|| async {
                let request = self
                    .http
                    .get(format!("{}/voices", self.config.base_url))
                    .header("xi-api-key", key);
                send(request, self.timeouts.probe, "voices").await.map(|_| ())
            })
            .await
    }

    /// Synthesize `request.text` with the emotion's voice.
    ///
    /// Falls back to a text placeholder artifact: `success` stays true so
    /// movement and captions still render, but `supports_playback` is false.
    pub async fn text_to_speech(&self, request: &SpeechRequest) -> CapabilityResult<SpeechResult> {
        let profile = EmotionProfile::for_emotion(request.emotion);
        let voice_id = request
            .voice_id
            .clone()
            .unwrap_or_else(|| profile.voice.voice_id.to_string());
        let now = Utc::now();

        let outcome = self
            .health
            .attempt("text_to_speech", || {
                self.synthesize(request, profile, &voice_id, now)
            })
            .await;

        match outcome {
            Ok(audio) => {
                tracing::info!(
                    file = %audio.filename,
                    bytes = audio.file_size,
                    emotion = %request.emotion,
                    "Synthesized speech"
                );
                let url = ArtifactStore::url(ArtifactKind::Audio, &audio.filename);
                CapabilityResult::live(SpeechResult {
                    success: true,
                    audio_url: Some(url.clone()),
                    artifact_url: url,
                    filename: audio.filename,
                    text: request.text.clone(),
                    emotion: request.emotion,
                    voice_id,
                    file_size: audio.file_size,
                    duration_estimate: duration_estimate(&request.text),
                    supports_playback: true,
                    supports_movement: true,
                    supports_captions: true,
                    is_fallback: false,
                    generated_at: now,
                })
            }
            Err(reason) => {
                let result = self.placeholder(request, voice_id, &reason, now).await;
                CapabilityResult::fallback(result, reason)
            }
        }
    }

    pub async fn available_voices(&self) -> CapabilityResult<Vec<VoiceInfo>> {
        let outcome = self
            .health
            .attempt("available_voices", || async {
                let key = require_key(&self.config.api_key)?;
                let request = self
                    .http
                    .get(format!("{}/voices", self.config.base_url))
                    .header("xi-api-key", key);
                let response = send(request, self.timeouts.call, "voices").await?;
                let parsed: VoicesResponse = read_json(response, self.timeouts.call).await?;
                Ok(parsed.voices)
            })
            .await;

        match outcome {
            Ok(voices) => CapabilityResult::live(voices),
            Err(reason) => CapabilityResult::fallback(default_voices(), reason),
        }
    }

    async fn synthesize(
        &self,
        request: &SpeechRequest,
        profile: &EmotionProfile,
        voice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Synthesized, CapabilityError> {
        let key = require_key(&self.config.api_key)?;
        let body = SynthesisBody {
            text: &request.text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: profile.voice.stability,
                similarity_boost: profile.voice.similarity_boost,
            },
        };
        let url = endpoint(&self.config.base_url, &["text-to-speech", voice_id])?;
        let http_request = self
            .http
            .post(url)
            .header("xi-api-key", key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body);
        let mut response = send(http_request, self.timeouts.speech, "text-to-speech").await?;

        let filename = artifact_name(
            "speech",
            request.emotion.as_str(),
            &synthesis_key(&body, voice_id),
            "mp3",
            now,
        );
        let storage_err = |err: std::io::Error| CapabilityError::Storage(err.to_string());

        let Some(NewArtifact { mut file, .. }) = self
            .store
            .create_new(ArtifactKind::Audio, &filename)
            .await
            .map_err(storage_err)?
        else {
            let file_size = self
                .store
                .size_of(ArtifactKind::Audio, &filename)
                .await
                .map_err(storage_err)?;
            return Ok(Synthesized {
                filename,
                file_size,
            });
        };

        let written = match stream_audio(&mut response, &mut file, self.timeouts.speech).await {
            Ok(written) => written,
            Err(err) => {
                drop(file);
                self.store.discard(ArtifactKind::Audio, &filename).await;
                return Err(err);
            }
        };

        Ok(Synthesized {
            filename,
            file_size: written,
        })
    }

    async fn placeholder(
        &self,
        request: &SpeechRequest,
        voice_id: String,
        reason: &str,
        now: DateTime<Utc>,
    ) -> SpeechResult {
        let filename = artifact_name(
            "fallback",
            request.emotion.as_str(),
            &format!("{voice_id}|{}", request.text),
            "txt",
            now,
        );
        let contents = placeholder_text(&request.text, request.emotion, &voice_id, reason, now);
        let file_size = match self
            .store
            .write_new(ArtifactKind::Audio, &filename, contents.as_bytes())
            .await
        {
            Ok(size) => size,
            Err(err) => {
                tracing::warn!(file = %filename, error = %err, "Could not write speech placeholder");
                0
            }
        };

        SpeechResult {
            success: true,
            audio_url: None,
            artifact_url: ArtifactStore::url(ArtifactKind::Audio, &filename),
            filename,
            text: request.text.clone(),
            emotion: request.emotion,
            voice_id,
            file_size,
            duration_estimate: duration_estimate(&request.text),
            supports_playback: false,
            supports_movement: true,
            supports_captions: true,
            is_fallback: true,
            generated_at: now,
        }
    }
}

async fn stream_audio(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
    timeout: std::time::Duration,
) -> Result<u64, CapabilityError> {
    let storage_err = |err: std::io::Error| CapabilityError::Storage(err.to_string());
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| CapabilityError::from_reqwest(err, timeout))?
    {
        file.write_all(&chunk).await.map_err(storage_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(storage_err)?;
    if written == 0 {
        return Err(CapabilityError::MalformedResponse("empty audio body".to_string()));
    }
    Ok(written)
}

/// Everything that shapes the audio, so different voices or settings never
/// share a file.
fn synthesis_key(body: &SynthesisBody<'_>, voice_id: &str) -> String {
    format!(
        "{voice_id}|{}|{}|{}|{}",
        body.model_id, body.voice_settings.stability, body.voice_settings.similarity_boost, body.text
    )
}

fn placeholder_text(
    text: &str,
    emotion: Emotion,
    voice_id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "Speech synthesis unavailable; no audio was produced.\n\
         text: {text}\n\
         emotion: {emotion}\n\
         voice_id: {voice_id}\n\
         reason: {reason}\n\
         generated_at: {}\n",
        at.to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(base_url: &str, api_key: Option<&str>, root: &std::path::Path) -> SpeechClient {
        SpeechClient::new(
            reqwest::Client::new(),
            SpeechConfig {
                api_key: api_key.map(str::to_string),
                base_url: base_url.to_string(),
                model_id: "eleven_monolingual_v1".to_string(),
            },
            Timeouts::default(),
            ArtifactStore::new(root),
        )
    }

    fn request(text: &str, emotion: Emotion) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            emotion,
            voice_id: None,
        }
    }

    async fn synthesis_calls(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().starts_with("/text-to-speech/"))
            .count()
    }

    #[tokio::test]
    async fn live_synthesis_streams_audio_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/21m00Tcm4TlvDq8ikWAM"))
            .and(header("xi-api-key", "sk_test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-fake-mpeg".to_vec()))
            .mount(&server)
            .await;

        let result = client(&server.uri(), Some("sk_test"), dir.path())
            .text_to_speech(&request("I feel peaceful and ready to move forward", Emotion::Calm))
            .await;

        assert!(!result.is_fallback());
        let speech = result.payload();
        assert!(speech.supports_playback);
        assert_eq!(speech.file_size, 13);
        assert!(speech.filename.starts_with("speech_calm_"));
        assert_eq!(
            speech.audio_url.as_deref(),
            Some(format!("/audio/{}", speech.filename).as_str())
        );
        let stored = std::fs::read(dir.path().join("audio").join(&speech.filename)).unwrap();
        assert_eq!(stored, b"ID3-fake-mpeg");
    }

    #[tokio::test]
    async fn transport_failure_yields_placeholder_and_latches() {
        let dir = tempfile::tempdir().unwrap();
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let closed = format!("http://127.0.0.1:{port}");
        let client = client(&closed, Some("sk_test"), dir.path());

        let result = client
            .text_to_speech(&request("Let's turn left", Emotion::Excited))
            .await;

        assert!(result.is_fallback());
        assert!(result.fallback_reason().unwrap().starts_with("TransportFailure"));
        let speech = result.payload();
        assert!(speech.success);
        assert!(speech.is_fallback);
        assert!(!speech.supports_playback);
        assert!(speech.supports_movement && speech.supports_captions);
        assert!(speech.audio_url.is_none());
        assert!(speech.filename.starts_with("fallback_excited_"));
        assert!(speech.filename.ends_with(".txt"));
        let placeholder =
            std::fs::read_to_string(dir.path().join("audio").join(&speech.filename)).unwrap();
        assert!(placeholder.contains("Let's turn left"));
        assert!(client.health().current().fallback_engaged);
    }

    #[tokio::test]
    async fn latched_client_skips_synthesis_until_probe_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/EXAVITQu4vr4xnSDxMaL"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());
        let sad = request("I need to stop here", Emotion::Sad);

        assert!(client.text_to_speech(&sad).await.is_fallback());
        for _ in 0..3 {
            assert!(client.text_to_speech(&sad).await.is_fallback());
        }
        assert_eq!(synthesis_calls(&server).await, 1);

        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "voices": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/EXAVITQu4vr4xnSDxMaL"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        assert!(client.health_check().await);
        assert!(!client.text_to_speech(&sad).await.is_fallback());
        assert_eq!(synthesis_calls(&server).await, 2);
    }

    #[tokio::test]
    async fn different_voices_never_share_an_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/voiceA"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-from-a".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/voiceB"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-from-b".to_vec()))
            .mount(&server)
            .await;
        let client = client(&server.uri(), Some("sk_test"), dir.path());

        let mut stored = Vec::new();
        for voice in ["voiceA", "voiceB"] {
            let mut req = request("Let's go forward", Emotion::Happy);
            req.voice_id = Some(voice.to_string());
            let result = client.text_to_speech(&req).await;
            assert!(!result.is_fallback());
            let filename = result.payload().filename.clone();
            stored.push((
                filename.clone(),
                std::fs::read(dir.path().join("audio").join(filename)).unwrap(),
            ));
        }

        assert_ne!(stored[0].0, stored[1].0);
        assert_eq!(stored[0].1, b"audio-from-a");
        assert_eq!(stored[1].1, b"audio-from-b");
    }

    #[tokio::test]
    async fn voice_id_is_sent_as_a_single_path_segment() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        let mut req = request("Stop", Emotion::Calm);
        req.voice_id = Some("../voices/add".to_string());
        client(&server.uri(), Some("sk_test"), dir.path())
            .text_to_speech(&req)
            .await;

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/text-to-speech/..%2Fvoices%2Fadd");
    }

    #[tokio::test]
    async fn voices_fall_back_to_builtin_list_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let client = client(&server.uri(), None, dir.path());

        let voices = client.available_voices().await;
        assert!(voices.is_fallback());
        assert_eq!(voices.payload().len(), 3);
        assert!(!client.health_check().await);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn live_voices_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "voices": [
                    { "voice_id": "abc", "name": "Nova", "category": "cloned" }
                ]
            })))
            .mount(&server)
            .await;

        let voices = client(&server.uri(), Some("sk_test"), dir.path())
            .available_voices()
            .await;
        assert!(!voices.is_fallback());
        assert_eq!(voices.payload()[0].name, "Nova");
        assert!(voices.payload()[0].available_for_tiers.is_empty());
    }
}
