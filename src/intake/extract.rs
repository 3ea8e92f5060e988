use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::capability::NeedSet;
use crate::models::emergency::{EmergencyType, Urgency};
use crate::models::intake::{ChatMessage, ChatRole, Confidence, EmergencyIntakeData};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no extraction backend configured")]
    NotConfigured,

    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction returned no text")]
    EmptyResponse,

    #[error("extraction returned malformed json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Turns a conversation into structured intake fields.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, conversation: &[ChatMessage]) -> Result<EmergencyIntakeData, ExtractError>;
}

/// Used when no model credentials are configured; every call falls back.
pub struct DisabledExtractor;

#[async_trait]
impl Extractor for DisabledExtractor {
    async fn extract(&self, _conversation: &[ChatMessage]) -> Result<EmergencyIntakeData, ExtractError> {
        Err(ExtractError::NotConfigured)
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You help people in emergencies. Read the conversation and reply with ONE JSON object and nothing else, using these keys:
emergency_type: one of flood, fire, earthquake, hurricane, layoff, medical, other
urgency: critical (life-threatening), high, medium or low
location_address, location_city, location_state: strings, empty when unknown
requester_name, requester_phone, requester_email: strings, empty when unknown
people_affected: number
has_children, has_elderly, has_disabilities: booleans
specific_needs: list drawn from shelter, food, medical, clothing, transportation, financial, cleanup, repairs
additional_context: short free text
confidence: high, medium or low
missing_info: list of missing critical details
follow_up_question: a single short empathetic question, or null when nothing is missing
is_complete: true only when type, urgency, at least a city, and one need are known"#;

pub fn build_prompt(conversation: &[ChatMessage]) -> String {
    let transcript = conversation
        .iter()
        .filter(|message| message.role != ChatRole::System)
        .map(|message| {
            let speaker = match message.role {
                ChatRole::User => "User",
                _ => "Assistant",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{EXTRACTION_INSTRUCTIONS}\n\nConversation so far:\n{transcript}\n\nJSON:")
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn enum_field<T: for<'de> Deserialize<'de>>(raw: &Value, key: &str) -> Option<T> {
    let value = raw.get(key)?.as_str()?.trim().to_ascii_lowercase();
    serde_json::from_value(Value::String(value)).ok()
}

fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(raw: &Value, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses model output, filling defaults for anything missing or malformed.
pub fn parse_extraction(text: &str) -> Result<EmergencyIntakeData, ExtractError> {
    let raw: Value = serde_json::from_str(strip_code_fence(text))?;

    let specific_needs = string_list(&raw, "specific_needs")
        .iter()
        .map(String::as_str)
        .collect::<NeedSet>();

    let people_affected = raw
        .get("people_affected")
        .and_then(Value::as_f64)
        .filter(|count| *count > 0.0)
        .map_or(0, |count| count.round() as u32);

    Ok(EmergencyIntakeData {
        emergency_type: enum_field(&raw, "emergency_type").unwrap_or(EmergencyType::Other),
        urgency: enum_field(&raw, "urgency").unwrap_or(Urgency::Medium),
        location_address: text_field(&raw, "location_address").unwrap_or_default(),
        location_city: text_field(&raw, "location_city"),
        location_state: text_field(&raw, "location_state"),
        requester_name: text_field(&raw, "requester_name"),
        requester_phone: text_field(&raw, "requester_phone"),
        requester_email: text_field(&raw, "requester_email"),
        people_affected,
        has_children: bool_field(&raw, "has_children"),
        has_elderly: bool_field(&raw, "has_elderly"),
        has_disabilities: bool_field(&raw, "has_disabilities"),
        specific_needs,
        additional_context: text_field(&raw, "additional_context").unwrap_or_default(),
        confidence: enum_field(&raw, "confidence").unwrap_or(Confidence::Low),
        missing_info: string_list(&raw, "missing_info"),
        follow_up_question: text_field(&raw, "follow_up_question"),
        is_complete: bool_field(&raw, "is_complete"),
    })
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Deserialize)]
struct GenerateCandidate {
    content: Option<GenerateContent>,
}

#[derive(Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Deserialize)]
struct GeneratePart {
    text: Option<String>,
}

/// Extraction through the Gemini `generateContent` API.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, conversation: &[ChatMessage]) -> Result<EmergencyIntakeData, ExtractError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(conversation) }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response: GenerateResponse = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text: String = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyResponse);
        }

        parse_extraction(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, parse_extraction};
    use crate::models::capability::Need;
    use crate::models::emergency::{EmergencyType, Urgency};
    use crate::models::intake::{ChatMessage, ChatRole, Confidence};

    #[test]
    fn parses_fenced_model_output() {
        let text = r#"```json
{
  "emergency_type": "Flood",
  "urgency": "critical",
  "location_address": "123 Oak Street",
  "location_city": "Springfield",
  "people_affected": 4,
  "has_children": true,
  "specific_needs": ["shelter", "food", "repairs"],
  "confidence": "high",
  "follow_up_question": null,
  "is_complete": true
}
```"#;

        let data = parse_extraction(text).unwrap();
        assert_eq!(data.emergency_type, EmergencyType::Flood);
        assert_eq!(data.urgency, Urgency::Critical);
        assert_eq!(data.location_city.as_deref(), Some("Springfield"));
        assert_eq!(data.people_affected, 4);
        assert!(data.has_children);
        assert!(!data.has_elderly);
        assert!(data.specific_needs.contains(Need::Shelter));
        assert!(data.specific_needs.contains(Need::Food));
        assert_eq!(data.confidence, Confidence::High);
        assert!(data.follow_up_question.is_none());
        assert!(data.is_complete);
    }

    #[test]
    fn fills_defaults_for_missing_or_odd_fields() {
        let data = parse_extraction(r#"{"emergency_type": "tornado", "people_affected": "many", "location_city": "  "}"#)
            .unwrap();

        assert_eq!(data.emergency_type, EmergencyType::Other);
        assert_eq!(data.urgency, Urgency::Medium);
        assert_eq!(data.confidence, Confidence::Low);
        assert_eq!(data.people_affected, 0);
        assert!(data.location_city.is_none());
        assert!(data.specific_needs.is_empty());
        assert!(!data.is_complete);
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_extraction("I could not understand that").is_err());
    }

    #[test]
    fn prompt_contains_transcript_without_system_messages() {
        let prompt = build_prompt(&[
            ChatMessage {
                role: ChatRole::System,
                content: "internal".to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: "My house is flooding".to_string(),
            },
            ChatMessage {
                role: ChatRole::Assistant,
                content: "Where are you?".to_string(),
            },
        ]);

        assert!(prompt.contains("User: My house is flooding\nAssistant: Where are you?"));
        assert!(!prompt.contains("internal"));
    }
}
