use chrono::Utc;
use pixelpeak_core::emotion::{Direction, Emotion};
use pixelpeak_core::provenance::CapabilityResult;
use pixelpeak_core::scenario::{Scenario, ScenarioRequest, SpeechPrompt, fallback_speech, round2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CapabilityError, read_json, require_key, send};
use crate::config::{CompletionConfig, Timeouts};
use crate::degradation::{HealthTracker, Service};

const SYSTEM_PROMPT: &str = "You are a clinical assistant that writes realistic \
brain-computer interface scenarios for patients with motor impairments. Reply \
with exactly what is asked and nothing else.";

const SPEECH_MAX_TOKENS: u32 = 100;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

struct ChatReply {
    content: String,
    tokens_used: u32,
}

/// Scenario object the model is asked to produce.
#[derive(Deserialize)]
struct GeneratedScenario {
    emotion: String,
    direction: String,
    emotion_confidence: f64,
    direction_confidence: f64,
    speech: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    medical_notes: Option<String>,
}

/// Chat-completion client used for scenario and sentence generation.
pub struct CompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
    timeouts: Timeouts,
    health: HealthTracker,
}

impl CompletionClient {
    pub fn new(http: reqwest::Client, config: CompletionConfig, timeouts: Timeouts) -> Self {
        let health = if config.api_key.is_some() {
            HealthTracker::new(Service::Completion)
        } else {
            HealthTracker::unconfigured(Service::Completion)
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

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Probe `GET /models`. Without a key this is false and sends nothing.
    pub async fn health_check(&self) -> bool {
        let Some(key) = self.config.api_key.as_deref() else {
            return false;
        };
        self.health
            .probe(|| async {
                let request = self
                    .http
                    .get(format!("{}/models", self.config.base_url))
                    .bearer_auth(key);
                send(request, self.timeouts.probe, "models").await.map(|_| ())
            })
            .await
    }

    /// Generate one scenario, honouring valid hints in `request`.
    pub async fn generate_scenario(&self, request: &ScenarioRequest) -> CapabilityResult<Scenario> {
        let outcome = self
            .health
            .attempt("generate_scenario", || self.live_scenario(request))
            .await;

        match outcome {
            Ok(scenario) => {
                tracing::info!(
                    scenario_id = %scenario.id,
                    emotion = %scenario.emotion,
                    direction = %scenario.direction,
                    tokens_used = scenario.tokens_used,
                    "Generated scenario"
                );
                CapabilityResult::live(scenario)
            }
            Err(reason) => {
                let scenario = Scenario::fallback(request, &mut rand::thread_rng());
                CapabilityResult::fallback(scenario, reason)
            }
        }
    }

    /// One sentence a patient in `prompt.emotion` would say to go
    /// `prompt.direction`.
    pub async fn emotion_to_speech(&self, prompt: &SpeechPrompt) -> CapabilityResult<String> {
        let (emotion, direction) = (prompt.emotion, prompt.direction);
        let prompt = speech_prompt(prompt);

        let outcome = self
            .health
            .attempt("emotion_to_speech", || async {
                let reply = self.chat(&prompt, SPEECH_MAX_TOKENS).await?;
                let sentence = clean_sentence(&reply.content);
                if sentence.is_empty() {
                    return Err(CapabilityError::MalformedResponse(
                        "empty sentence".to_string(),
                    ));
                }
                Ok(sentence)
            })
            .await;

        match outcome {
            Ok(sentence) => CapabilityResult::live(sentence),
            Err(reason) => CapabilityResult::fallback(fallback_speech(emotion, direction), reason),
        }
    }

    async fn live_scenario(&self, request: &ScenarioRequest) -> Result<Scenario, CapabilityError> {
        let reply = self
            .chat(&scenario_prompt(request), self.config.max_tokens)
            .await?;
        parse_scenario(&reply.content, reply.tokens_used, &self.config.model, request)
    }

    async fn chat(&self, prompt: &str, max_tokens: u32) -> Result<ChatReply, CapabilityError> {
        let key = require_key(&self.config.api_key)?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: self.config.temperature,
        };
        let request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(key)
            .json(&body);

        let response = send(request, self.timeouts.call, "chat completion").await?;
        let parsed: ChatResponse = read_json(response, self.timeouts.call).await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::MalformedResponse("no choices".to_string()))?;

        Ok(ChatReply {
            content,
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

fn scenario_prompt(request: &ScenarioRequest) -> String {
    let emotions = Emotion::ALL.map(Emotion::as_str).join(", ");
    let directions = Direction::ALL.map(Direction::as_str).join(", ");

    let mut prompt = format!(
        "Generate one realistic scenario for a patient controlling a VR avatar by thought.\n\
         Return a single JSON object with these fields:\n\
         - emotion: one of {emotions}\n\
         - direction: one of {directions}\n\
         - emotion_confidence: number between 0.70 and 0.95\n\
         - direction_confidence: number between 0.65 and 0.95\n\
         - speech: one natural sentence under 15 words that fits the emotion and mentions the direction\n\
         - context: one short line describing the patient's state\n\
         - medical_notes: optional short clinical remark\n"
    );
    if let Some(emotion) = request.emotion_hint() {
        prompt.push_str(&format!("The patient's emotion is {emotion}.\n"));
    }
    if let Some(direction) = request.direction_hint() {
        prompt.push_str(&format!("The intended direction is {direction}.\n"));
    }
    if let Some(context) = request.context.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Additional context: {context}\n"));
    }
    prompt
}

fn speech_prompt(prompt: &SpeechPrompt) -> String {
    let mut text = format!(
        "A patient using a brain-computer interface feels {} and wants to {}.\n",
        prompt.emotion,
        prompt.direction.phrase()
    );
    if let Some(confidence) = prompt.emotion_confidence {
        text.push_str(&format!("Emotion classifier confidence: {confidence:.2}.\n"));
    }
    if let Some(confidence) = prompt.direction_confidence {
        text.push_str(&format!("Direction classifier confidence: {confidence:.2}.\n"));
    }
    if let Some(context) = prompt.context.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        text.push_str(&format!("Situation: {context}\n"));
    }
    text.push_str(
        "Write one short, natural sentence (under 12 words) they would say. \
         Reply with the sentence only.",
    );
    text
}

/// Extract the JSON object from a model reply and validate it against the
/// closed vocabularies.
fn parse_scenario(
    content: &str,
    tokens_used: u32,
    model: &str,
    request: &ScenarioRequest,
) -> Result<Scenario, CapabilityError> {
    let malformed = |message: String| CapabilityError::MalformedResponse(message);

    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(malformed("no JSON object in reply".to_string())),
    };
    let generated: GeneratedScenario =
        serde_json::from_str(json).map_err(|err| malformed(err.to_string()))?;

    let emotion = Emotion::parse(&generated.emotion)
        .ok_or_else(|| malformed(format!("unknown emotion '{}'", generated.emotion)))?;
    let direction = Direction::parse(&generated.direction)
        .ok_or_else(|| malformed(format!("unknown direction '{}'", generated.direction)))?;
    let confidence = |value: f64, field: &str| {
        if value.is_finite() {
            Ok(round2(value.clamp(0.0, 1.0)))
        } else {
            Err(malformed(format!("{field} is not a number")))
        }
    };
    let speech = generated.speech.trim().to_string();
    if speech.is_empty() {
        return Err(malformed("empty speech".to_string()));
    }

    let now = Utc::now();
    let context = generated
        .context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| request.context.clone())
        .unwrap_or_else(|| format!("{emotion} patient wanting to {direction}"));

    Ok(Scenario {
        id: format!(
            "scenario_{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        ),
        emotion,
        direction,
        emotion_confidence: confidence(generated.emotion_confidence, "emotion_confidence")?,
        direction_confidence: confidence(generated.direction_confidence, "direction_confidence")?,
        speech,
        context,
        medical_notes: generated.medical_notes.filter(|n| !n.trim().is_empty()),
        model_used: model.to_string(),
        tokens_used,
        generated_at: now,
        avatar_movement: None,
        caption_style: None,
    })
}

fn clean_sentence(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}
