use axum::extract::State;
use axum::{Json, Router, routing::get, routing::post};
use pixelpeak_core::emotion::{Direction, Emotion};
use pixelpeak_core::scenario::{Scenario, ScenarioRequest, SpeechPrompt, demo_scenarios};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::orchestrator::{ScenarioOutcome, WorkflowOutcome};
use crate::routes::CapabilityResponse;
use crate::state::AppState;

/// Read-only scenario routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/scenarios", get(list_scenarios))
}

/// Routes that call the completion backend.
pub fn generate_router() -> Router<AppState> {
    Router::new()
        .route("/api/generate-scenario", post(generate_scenario))
        .route("/api/complete-workflow", post(complete_workflow))
        .route("/api/emotion-to-speech", post(emotion_to_speech))
}

#[derive(Serialize, ToSchema)]
pub struct ScenarioList {
    pub scenarios: Vec<Scenario>,
    pub total: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct EmotionToSpeechRequest {
    /// Free-form label; unknown labels are treated as `neutral`
    pub emotion: String,
    pub direction: String,
    /// Emotion classifier confidence in [0, 1]
    #[serde(default)]
    pub emotion_confidence: Option<f64>,
    /// Direction classifier confidence in [0, 1]
    #[serde(default)]
    pub direction_confidence: Option<f64>,
    /// Situation description passed to the model
    #[serde(default)]
    pub context: Option<String>,
}

fn check_confidence(field: &str, value: Option<f64>) -> Result<Option<f64>, AppError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(AppError::invalid_field(
            field,
            format!("{field} must be between 0 and 1"),
            Some(serde_json::json!(v)),
        )),
        other => Ok(other),
    }
}

/// Unknown direction hints are rejected; unknown emotion hints resolve to
/// neutral.
fn check_hints(request: &ScenarioRequest) -> Result<(), AppError> {
    match request.invalid_direction_hint() {
        Some(hint) => Err(AppError::invalid_field(
            "direction_hint",
            format!("Unknown direction '{hint}'"),
            Some(serde_json::Value::String(hint.to_string())),
        )),
        None => Ok(()),
    }
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedSpeech {
    pub text: String,
    pub emotion: Emotion,
    pub direction: Direction,
}

#[utoipa::path(
    get,
    path = "/api/scenarios",
    responses((status = 200, description = "Canned demo scenarios", body = ScenarioList)),
    tag = "scenarios"
)]
pub async fn list_scenarios() -> Json<ScenarioList> {
    let scenarios: Vec<Scenario> = demo_scenarios().into_iter().map(Scenario::enrich).collect();
    Json(ScenarioList {
        total: scenarios.len(),
        scenarios,
    })
}

/// Generate and enrich one scenario, then store it as a pattern.
#[utoipa::path(
    post,
    path = "/api/generate-scenario",
    request_body = ScenarioRequest,
    responses(
        (status = 200, description = "Scenario (live or fallback)", body = ScenarioOutcome),
        (status = 400, description = "Malformed body or unknown direction hint", body = pixelpeak_core::error::ApiError)
    ),
    tag = "scenarios"
)]
pub async fn generate_scenario(
    State(state): State<AppState>,
    AppJson(request): AppJson<ScenarioRequest>,
) -> Result<Json<ScenarioOutcome>, AppError> {
    check_hints(&request)?;
    Ok(Json(state.orchestrator.generate_scenario(&request).await))
}

/// Scenario, speech, pattern storage and a stored scenario artifact.
#[utoipa::path(
    post,
    path = "/api/complete-workflow",
    request_body = ScenarioRequest,
    responses(
        (status = 200, description = "Workflow result; each stage carries its provenance", body = WorkflowOutcome),
        (status = 400, description = "Malformed body or unknown direction hint", body = pixelpeak_core::error::ApiError)
    ),
    tag = "scenarios"
)]
pub async fn complete_workflow(
    State(state): State<AppState>,
    AppJson(request): AppJson<ScenarioRequest>,
) -> Result<Json<WorkflowOutcome>, AppError> {
    check_hints(&request)?;
    Ok(Json(state.orchestrator.complete_workflow(&request).await))
}

#[utoipa::path(
    post,
    path = "/api/emotion-to-speech",
    request_body = EmotionToSpeechRequest,
    responses(
        (status = 200, description = "Sentence for the emotion and direction", body = CapabilityResponse<GeneratedSpeech>),
        (status = 400, description = "Unknown direction or confidence outside [0, 1]", body = pixelpeak_core::error::ApiError)
    ),
    tag = "scenarios"
)]
pub async fn emotion_to_speech(
    State(state): State<AppState>,
    AppJson(request): AppJson<EmotionToSpeechRequest>,
) -> Result<Json<CapabilityResponse<GeneratedSpeech>>, AppError> {
    let direction = Direction::parse(&request.direction).ok_or_else(|| {
        AppError::invalid_field(
            "direction",
            format!("Unknown direction '{}'", request.direction),
            Some(serde_json::Value::String(request.direction.clone())),
        )
    })?;
    let emotion = Emotion::parse_or_neutral(&request.emotion);
    let prompt = SpeechPrompt {
        emotion,
        direction,
        emotion_confidence: check_confidence("emotion_confidence", request.emotion_confidence)?,
        direction_confidence: check_confidence(
            "direction_confidence",
            request.direction_confidence,
        )?,
        context: request.context,
    };

    let result = state
        .orchestrator
        .completion()
        .emotion_to_speech(&prompt)
        .await
        .map(|text| GeneratedSpeech {
            text,
            emotion,
            direction,
        });
    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::routes::test_support::{call, get as get_request, json_request, offline_state};

    fn app(root: &std::path::Path) -> Router {
        router()
            .merge(generate_router())
            .with_state(offline_state(root))
    }

    #[tokio::test]
    async fn workflow_degrades_to_fallback_scenario_and_placeholder_speech() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/complete-workflow",
                json!({ "emotion_hint": "anxious", "direction_hint": "backward" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scenario"]["emotion"], "anxious");
        assert_eq!(body["scenario_meta"]["provenance"], "fallback");
        assert_eq!(body["speech"]["success"], true);
        assert_eq!(body["speech"]["supports_playback"], false);
        assert!(body["speech"]["audio_url"].is_null());
        assert!(body["scenario"]["avatar_movement"].is_object());
        assert_eq!(body["pattern_meta"]["is_fallback"], true);
    }

    #[tokio::test]
    async fn unknown_direction_is_rejected_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/emotion-to-speech",
                json!({ "emotion": "calm", "direction": "sideways" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "direction");
    }

    #[tokio::test]
    async fn unknown_emotion_uses_neutral_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/emotion-to-speech",
                json!({ "emotion": "bewildered", "direction": "forward" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["emotion"], "neutral");
        assert_eq!(body["data"]["text"], "I want to keep moving forward");
        assert_eq!(body["meta"]["is_fallback"], true);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/emotion-to-speech",
                json!({ "emotion": "calm", "direction": "left", "emotion_confidence": 1.5 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "emotion_confidence");

        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/emotion-to-speech",
                json!({ "emotion": "calm", "direction": "left", "direction_confidence": -0.1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "direction_confidence");
    }

    #[tokio::test]
    async fn confidences_and_context_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/emotion-to-speech",
                json!({
                    "emotion": "anxious",
                    "direction": "backward",
                    "emotion_confidence": 0.87,
                    "direction_confidence": 1.0,
                    "context": "crowded corridor"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["text"], "I'm feeling nervous, can we go back?");
    }

    #[tokio::test]
    async fn unknown_direction_hint_is_rejected_by_both_scenario_routes() {
        for uri in ["/api/generate-scenario", "/api/complete-workflow"] {
            let dir = tempfile::tempdir().unwrap();
            let (status, body) = call(
                app(dir.path()),
                json_request("POST", uri, json!({ "direction_hint": "sideways" })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["field"], "direction_hint");
            assert_eq!(body["received"], "sideways");
            assert!(!dir.path().join("scenarios").exists());
        }
    }

    #[tokio::test]
    async fn unknown_emotion_hint_resolves_to_neutral() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(
            app(dir.path()),
            json_request(
                "POST",
                "/api/generate-scenario",
                json!({ "emotion_hint": "furious", "direction_hint": "left" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scenario"]["emotion"], "neutral");
        assert_eq!(body["scenario"]["direction"], "left");
    }

    #[tokio::test]
    async fn demo_list_is_enriched() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(app(dir.path()), get_request("/api/scenarios")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert!(body["scenarios"][0]["caption_style"].is_object());
    }
}
