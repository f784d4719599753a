use std::collections::HashMap;

use chrono::Utc;
use pixelpeak_core::emotion::{Direction, Emotion};
use pixelpeak_core::patterns::{
    IndexStats, PatternQuery, PatternRecord, SAMPLE_PATTERNS, SimilarPattern, mock_index_stats,
    mock_similar_patterns,
};
use pixelpeak_core::provenance::CapabilityResult;
use pixelpeak_core::scenario::round2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::{CapabilityError, read_json, require_key, send};
use crate::config::{Timeouts, VectorConfig};
use crate::degradation::{HealthTracker, Service};

const API_VERSION: &str = "2024-07";

#[derive(Serialize)]
struct UpsertBody<'a> {
    vectors: [UpsertVector<'a>; 1],
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: Vec<f32>,
    metadata: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, PatternRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: u32,
    #[serde(default)]
    index_fullness: f64,
    #[serde(default)]
    namespaces: Value,
}

/// Vector-index client storing EEG pattern descriptions for similarity
/// search.
pub struct VectorStoreClient {
    http: reqwest::Client,
    config: VectorConfig,
    timeouts: Timeouts,
    health: HealthTracker,
}

impl VectorStoreClient {
    pub fn new(http: reqwest::Client, config: VectorConfig, timeouts: Timeouts) -> Self {
        let health = if config.api_key.is_some() && config.index_host.is_some() {
            HealthTracker::new(Service::VectorStore)
        } else {
            HealthTracker::unconfigured(Service::VectorStore)
        };
        Self {
            http,
            config,
            timeouts,
            health,
        }
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Probe `POST /describe_index_stats`.
    pub async fn health_check(&self) -> bool {
        if self.config.api_key.is_none() || self.config.index_host.is_none() {
            return false;
        }
        self.health
            .probe(|| async {
                let request = self.request(reqwest::Method::POST, "/describe_index_stats")?;
                send(request.json(&json!({})), self.timeouts.probe, "index stats")
                    .await
                    .map(|_| ())
            })
            .await
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        hashing_embedding(text, self.config.dimension)
    }

    /// Upsert one pattern under `pattern_id`. The payload is the id.
    pub async fn store_pattern(
        &self,
        pattern_id: &str,
        pattern: &PatternQuery,
        extra_metadata: Option<Value>,
    ) -> CapabilityResult<String> {
        let metadata = pattern_metadata(pattern, extra_metadata);
        let outcome = self
            .health
            .attempt("store_pattern", || async {
                let body = UpsertBody {
                    vectors: [UpsertVector {
                        id: pattern_id,
                        values: self.embed(&pattern.embedding_text()),
                        metadata,
                    }],
                };
                let request = self.request(reqwest::Method::POST, "/vectors/upsert")?;
                send(request.json(&body), self.timeouts.call, "upsert").await?;
                Ok(())
            })
            .await;

        match outcome {
            Ok(()) => {
                tracing::debug!(pattern_id, "Stored pattern");
                CapabilityResult::live(pattern_id.to_string())
            }
            Err(reason) => CapabilityResult::fallback(pattern_id.to_string(), reason),
        }
    }

    /// Nearest stored patterns. Live matches below `min_score` are dropped;
    /// the fallback returns between 1 and `top_k` synthetic records.
    pub async fn find_similar_patterns(
        &self,
        query: &PatternQuery,
        top_k: usize,
        min_score: f64,
    ) -> CapabilityResult<Vec<SimilarPattern>> {
        let outcome = self
            .health
            .attempt("find_similar_patterns", || async {
                let matches = self
                    .query(self.embed(&query.embedding_text()), top_k, None)
                    .await?;
                Ok(matches
                    .into_iter()
                    .filter(|m| m.score >= min_score)
                    .filter_map(similar_from_match)
                    .collect::<Vec<_>>())
            })
            .await;

        match outcome {
            Ok(patterns) => CapabilityResult::live(patterns),
            Err(reason) => CapabilityResult::fallback(
                mock_similar_patterns(query, top_k, &mut rand::thread_rng()),
                reason,
            ),
        }
    }

    /// Fetch one stored pattern. An absent id is a `ResourceNotFound` and
    /// answers with a synthetic record.
    pub async fn get_pattern(&self, pattern_id: &str) -> CapabilityResult<PatternRecord> {
        let outcome = self
            .health
            .attempt("get_pattern", || async {
                let request = self
                    .request(reqwest::Method::GET, "/vectors/fetch")?
                    .query(&[("ids", pattern_id)]);
                let response = send(request, self.timeouts.call, "fetch").await?;
                let mut fetched: FetchResponse = read_json(response, self.timeouts.call).await?;
                fetched.vectors.remove(pattern_id).ok_or_else(|| {
                    CapabilityError::ResourceNotFound(format!("pattern {pattern_id}"))
                })
            })
            .await;

        match outcome {
            Ok(record) => CapabilityResult::live(record),
            Err(reason) => CapabilityResult::fallback(
                PatternRecord {
                    id: pattern_id.to_string(),
                    values: Vec::new(),
                    metadata: json!({ "source": "mock" }),
                },
                reason,
            ),
        }
    }

    /// Delete one pattern. The payload says whether the index confirmed it.
    pub async fn delete_pattern(&self, pattern_id: &str) -> CapabilityResult<bool> {
        let outcome = self
            .health
            .attempt("delete_pattern", || async {
                let request = self.request(reqwest::Method::POST, "/vectors/delete")?;
                send(
                    request.json(&json!({ "ids": [pattern_id] })),
                    self.timeouts.call,
                    "delete",
                )
                .await?;
                Ok(())
            })
            .await;

        match outcome {
            Ok(()) => CapabilityResult::live(true),
            Err(reason) => CapabilityResult::fallback(false, reason),
        }
    }

    /// Stored patterns whose metadata carries `emotion`.
    pub async fn search_by_emotion(
        &self,
        emotion: Emotion,
        limit: usize,
    ) -> CapabilityResult<Vec<PatternRecord>> {
        let outcome = self
            .health
            .attempt("search_by_emotion", || async {
                let vector = self.embed(&format!("Patient emotion is {emotion}"));
                let filter = json!({ "emotion": { "$eq": emotion.as_str() } });
                let matches = self.query(vector, limit, Some(filter)).await?;
                Ok(matches
                    .into_iter()
                    .map(|m| PatternRecord {
                        id: m.id,
                        values: Vec::new(),
                        metadata: m.metadata.unwrap_or_else(|| json!({})),
                    })
                    .collect::<Vec<_>>())
            })
            .await;

        match outcome {
            Ok(records) => CapabilityResult::live(records),
            Err(reason) => {
                let query = PatternQuery {
                    emotion,
                    direction: Direction::Forward,
                    context: String::new(),
                    emotion_confidence: None,
                    direction_confidence: None,
                };
                let records = mock_similar_patterns(&query, limit, &mut rand::thread_rng())
                    .into_iter()
                    .map(|p| PatternRecord {
                        id: p.id,
                        values: Vec::new(),
                        metadata: json!({
                            "emotion": p.emotion,
                            "direction": p.direction,
                            "context": p.context,
                            "source": "mock",
                        }),
                    })
                    .collect();
                CapabilityResult::fallback(records, reason)
            }
        }
    }

    pub async fn index_stats(&self) -> CapabilityResult<IndexStats> {
        let outcome = self
            .health
            .attempt("index_stats", || async {
                let request = self.request(reqwest::Method::POST, "/describe_index_stats")?;
                let response =
                    send(request.json(&json!({})), self.timeouts.call, "index stats").await?;
                let stats: StatsResponse = read_json(response, self.timeouts.call).await?;
                Ok(IndexStats {
                    total_vector_count: stats.total_vector_count,
                    dimension: stats.dimension,
                    index_fullness: stats.index_fullness,
                    namespaces: stats.namespaces,
                })
            })
            .await;

        match outcome {
            Ok(stats) => CapabilityResult::live(stats),
            Err(reason) => CapabilityResult::fallback(
                mock_index_stats(u32::try_from(self.config.dimension).unwrap_or(u32::MAX)),
                reason,
            ),
        }
    }

    /// Seed the index with `count` canned patterns (the sample set repeated).
    /// Returns how many were stored live; stops at the first fallback.
    pub async fn populate_sample_patterns(&self, count: usize) -> usize {
        let samples: Vec<PatternQuery> = {
            let mut rng = rand::thread_rng();
            SAMPLE_PATTERNS
                .iter()
                .cycle()
                .take(count)
                .map(|(emotion, direction, context)| PatternQuery {
                    emotion: *emotion,
                    direction: *direction,
                    context: (*context).to_string(),
                    emotion_confidence: Some(round2(rng.gen_range(0.70..0.95))),
                    direction_confidence: Some(round2(rng.gen_range(0.70..0.95))),
                })
                .collect()
        };

        let mut stored = 0;
        for (i, pattern) in samples.iter().enumerate() {
            let id = format!("sample_{:03}", i + 1);
            let result = self
                .store_pattern(&id, pattern, Some(json!({ "source": "sample" })))
                .await;
            if result.is_fallback() {
                break;
            }
            stored += 1;
        }
        tracing::info!(stored, requested = count, "Seeded sample patterns");
        stored
    }

    fn request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
    ) -> Result<reqwest::RequestBuilder, CapabilityError> {
        let key = require_key(&self.config.api_key)?;
        let host = self
            .config
            .index_host
            .as_deref()
            .ok_or(CapabilityError::NotConfigured)?;
        Ok(self
            .http
            .request(method, format!("{host}{endpoint}"))
            .header("Api-Key", key)
            .header("X-Pinecone-API-Version", API_VERSION))
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, CapabilityError> {
        let body = QueryBody {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter,
        };
        let request = self.request(reqwest::Method::POST, "/query")?;
        let response = send(request.json(&body), self.timeouts.call, "query").await?;
        let parsed: QueryResponse = read_json(response, self.timeouts.call).await?;
        Ok(parsed.matches)
    }
}

fn pattern_metadata(pattern: &PatternQuery, extra: Option<Value>) -> Value {
    let mut metadata = json!({
        "emotion": pattern.emotion,
        "direction": pattern.direction,
        "context": pattern.context,
        "timestamp": Utc::now().to_rfc3339(),
        "source": "pixelpeak",
    });
    if let Some(confidence) = pattern.emotion_confidence {
        metadata["emotion_confidence"] = json!(confidence);
    }
    if let Some(confidence) = pattern.direction_confidence {
        metadata["direction_confidence"] = json!(confidence);
    }
    if let (Some(target), Some(Value::Object(extra))) = (metadata.as_object_mut(), extra) {
        target.extend(extra);
    }
    metadata
}

fn similar_from_match(m: QueryMatch) -> Option<SimilarPattern> {
    let metadata = m.metadata.unwrap_or_else(|| json!({}));
    let label = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| metadata.get(key).and_then(Value::as_f64);

    let emotion = label("emotion").as_deref().and_then(Emotion::parse);
    let direction = label("direction").as_deref().and_then(Direction::parse);
    let (Some(emotion), Some(direction)) = (emotion, direction) else {
        tracing::debug!(pattern_id = %m.id, "Skipping match with unknown labels");
        return None;
    };

    Some(SimilarPattern {
        id: m.id,
        similarity_score: m.score.clamp(0.0, 1.0),
        emotion,
        direction,
        context: label("context").unwrap_or_default(),
        emotion_confidence: number("emotion_confidence"),
        direction_confidence: number("direction_confidence"),
        timestamp: label("timestamp"),
        metadata: metadata.clone(),
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map(|token| token.trim_matches('.').to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Deterministic feature-hashing embedding, L2-normalized.
pub fn hashing_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vec = vec![0.0_f32; dimensions];
    if dimensions == 0 {
        return vec;
    }

    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    for (token, count) in counts {
        let digest = Sha256::digest(token.as_bytes());
        let bucket =
            u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % dimensions;
        let sign = if digest[4] % 2 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign * count as f32;
    }

    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vec {
            *value /= norm;
        }
    }
    vec
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(host: Option<&str>, api_key: Option<&str>) -> VectorStoreClient {
        VectorStoreClient::new(
            reqwest::Client::new(),
            VectorConfig {
                api_key: api_key.map(str::to_string),
                index_host: host.map(str::to_string),
                dimension: 64,
            },
            Timeouts::default(),
        )
    }

    fn query() -> PatternQuery {
        PatternQuery {
            emotion: Emotion::Calm,
            direction: Direction::Forward,
            context: "VR hallway".to_string(),
            emotion_confidence: Some(0.8),
            direction_confidence: Some(0.9),
        }
    }

    #[test]
    fn embedding_is_deterministic_and_normalized() {
        let a = hashing_embedding("Patient emotion is calm", 64);
        assert_eq!(a, hashing_embedding("Patient emotion is calm", 64));
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(hashing_embedding("", 64).iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn live_matches_are_filtered_by_min_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("Api-Key", "pcsk_test"))
            .and(body_partial_json(json!({ "topK": 5, "includeMetadata": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    { "id": "a", "score": 0.93, "metadata": {
                        "emotion": "calm", "direction": "forward", "context": "ready" } },
                    { "id": "b", "score": 0.41, "metadata": {
                        "emotion": "sad", "direction": "stop" } },
                    { "id": "c", "score": 0.88, "metadata": {
                        "emotion": "bored", "direction": "forward" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(Some(&server.uri()), Some("pcsk_test"))
            .find_similar_patterns(&query(), 5, 0.7)
            .await;

        assert!(!result.is_fallback());
        let ids: Vec<_> = result.payload().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(result.payload()[0].context, "ready");
    }

    #[tokio::test]
    async fn fallback_search_returns_bounded_mock_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(Some(&server.uri()), Some("pcsk_test"));

        for top_k in [1, 2, 5] {
            let result = client.find_similar_patterns(&query(), top_k, 0.7).await;
            assert!(result.is_fallback());
            let patterns = result.payload();
            assert!((1..=top_k).contains(&patterns.len()));
            for pattern in patterns {
                assert!((0.0..=1.0).contains(&pattern.similarity_score));
                assert_eq!(pattern.metadata["source"], "mock");
            }
        }
    }

    #[tokio::test]
    async fn missing_pattern_falls_back_without_latching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vectors/fetch"))
            .and(query_param("ids", "nope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vectors": {} })))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(Some(&server.uri()), Some("pcsk_test"));

        let result = client.get_pattern("nope").await;
        assert!(result.is_fallback());
        assert!(result.fallback_reason().unwrap().starts_with("ResourceNotFound"));
        assert_eq!(result.payload().id, "nope");
        assert!(!client.health().current().fallback_engaged);
    }

    #[tokio::test]
    async fn stats_probe_clears_latched_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "namespaces": { "": { "vectorCount": 12 } },
                "dimension": 64,
                "indexFullness": 0.0,
                "totalVectorCount": 12
            })))
            .expect(2)
            .mount(&server)
            .await;
        let client = client(Some(&server.uri()), Some("pcsk_test"));
        client.health().record_failure(&CapabilityError::Auth(401));

        assert!(client.index_stats().await.is_fallback());
        assert!(client.health_check().await);
        let stats = client.index_stats().await;
        assert!(!stats.is_fallback());
        assert_eq!(stats.payload().total_vector_count, 12);
    }

    #[tokio::test]
    async fn seeding_stops_at_first_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let stored = client(Some(&server.uri()), Some("pcsk_test"))
            .populate_sample_patterns(12)
            .await;
        assert_eq!(stored, 3);
    }

    #[tokio::test]
    async fn missing_index_host_is_unconfigured() {
        let client = client(None, Some("pcsk_test"));
        assert!(!client.health_check().await);
        let stats = client.index_stats().await;
        assert!(stats.is_fallback());
        assert_eq!(stats.payload().total_vector_count, 25);
        assert!(!client.delete_pattern("x").await.payload());
    }

    #[test]
    fn metadata_merges_extra_fields() {
        let metadata = pattern_metadata(&query(), Some(json!({ "scenario_id": "s1" })));
        assert_eq!(metadata["emotion"], "calm");
        assert_eq!(metadata["direction"], "forward");
        assert_eq!(metadata["scenario_id"], "s1");
        assert_eq!(metadata["emotion_confidence"], 0.8);
    }
}
