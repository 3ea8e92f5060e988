//! Conversational intake: gate, extract, reply, record, match.

pub mod extract;
pub mod geocode;

use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::orchestrator;
use crate::error::AppError;
use crate::geo::Coordinate;
use crate::models::emergency::{Emergency, EmergencyStatus, Urgency};
use crate::models::intake::{ChatMessage, EmergencyIntakeData};
use crate::security::{RateLimitDecision, SessionDecision};
use crate::state::AppState;

pub use extract::{DisabledExtractor, ExtractError, Extractor, GeminiExtractor};
pub use geocode::{DisabledGeocoder, GeocodeError, Geocoder, NominatimGeocoder};

const GENERIC_REASK: &str =
    "Thank you for that information. Can you tell me more about your situation and your location?";

#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Sleep for the limiter's advisory delay before answering.
    pub apply_progressive_delay: bool,
    pub auto_match: bool,
    pub extraction_timeout: Duration,
    pub geocode_timeout: Duration,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            apply_progressive_delay: true,
            auto_match: true,
            extraction_timeout: Duration::from_secs(20),
            geocode_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub session_id: String,
    pub extracted: EmergencyIntakeData,
    pub ai_response: String,
    pub emergency_id: Option<Uuid>,
    pub delay_ms: u64,
    pub match_ids: Vec<Uuid>,
}

pub fn compose_reply(data: &EmergencyIntakeData) -> String {
    if let Some(question) = &data.follow_up_question {
        return question.clone();
    }

    if !data.is_complete {
        return GENERIC_REASK.to_string();
    }

    let urgency_text = match data.urgency {
        Urgency::Critical => "This is a critical situation and we will prioritize your request.",
        Urgency::High => "This is urgent and we will find help for you quickly.",
        _ => "We understand your situation.",
    };

    format!(
        "{urgency_text} I've recorded that you need help with {} at {}. \
         We're now matching you with available volunteers and resources in your area. \
         You should hear back very soon.",
        emergency_type_label(data),
        data.display_location()
    )
}

fn emergency_type_label(data: &EmergencyIntakeData) -> String {
    serde_json::to_value(data.emergency_type)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| "your emergency".to_string())
}

fn geocode_query(data: &EmergencyIntakeData) -> String {
    [
        Some(data.location_address.as_str()),
        data.location_city.as_deref(),
        data.location_state.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn emergency_from_intake(
    data: &EmergencyIntakeData,
    location: Option<Coordinate>,
    session_id: &str,
) -> Emergency {
    let address = data.display_location().trim();

    Emergency {
        id: Uuid::new_v4(),
        emergency_type: data.emergency_type,
        urgency: data.urgency,
        description: Some(data.additional_context.clone()).filter(|text| !text.is_empty()),
        location,
        location_address: Some(address.to_string()).filter(|text| !text.is_empty()),
        people_affected: Some(data.people_affected).filter(|count| *count > 0),
        has_children: data.has_children,
        has_elderly: data.has_elderly,
        has_disabilities: data.has_disabilities,
        specific_needs: data.specific_needs.clone(),
        status: EmergencyStatus::Open,
        requester_name: data.requester_name.clone(),
        requester_phone: data.requester_phone.clone(),
        requester_email: data.requester_email.clone(),
        session_id: Some(session_id.to_string()),
        created_at: Utc::now(),
    }
}

/// Rejects blocked addresses on every turn, continues a live session owned by
/// `ip`, or gates and opens a new one. Returns the session id and the advisory delay.
fn admit(state: &AppState, ip: &str, session_id: Option<String>) -> Result<(String, u64), AppError> {
    if let Some(blocked) = state.limiter.blocked(ip) {
        return Err(deny(state, ip, blocked));
    }

    if let Some(id) = &session_id {
        if state.limiter.update_session(ip, id) {
            return Ok((id.clone(), 0));
        }
    }

    let delay_ms = match state.limiter.check(ip) {
        RateLimitDecision::Allowed { delay_ms } => {
            record_decision(state, "allowed");
            delay_ms
        }
        denied => return Err(deny(state, ip, denied)),
    };

    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    match state.limiter.create_session(ip, &session_id) {
        SessionDecision::Denied { reason } => {
            warn!(%ip, %reason, "intake session denied");
            Err(AppError::TooManyRequests {
                reason,
                retry_after_seconds: None,
            })
        }
        SessionDecision::Created | SessionDecision::Refreshed => Ok((session_id, delay_ms)),
    }
}

fn record_decision(state: &AppState, label: &str) {
    state
        .metrics
        .rate_limit_decisions_total
        .with_label_values(&[label])
        .inc();
}

fn deny(state: &AppState, ip: &str, decision: RateLimitDecision) -> AppError {
    record_decision(state, decision.label());

    let (reason, retry_after_seconds) = match decision {
        RateLimitDecision::Limited {
            reason,
            retry_after_seconds,
        }
        | RateLimitDecision::Blocked {
            reason,
            retry_after_seconds,
        } => (reason, retry_after_seconds),
        RateLimitDecision::Allowed { .. } => (String::new(), 0),
    };

    warn!(%ip, %reason, retry_after_seconds, "intake request denied");
    AppError::TooManyRequests {
        reason,
        retry_after_seconds: Some(retry_after_seconds),
    }
}

async fn extract(state: &AppState, messages: &[ChatMessage]) -> EmergencyIntakeData {
    let outcome = timeout(
        state.intake.extraction_timeout,
        state.extractor.extract(messages),
    )
    .await;

    let (label, data) = match outcome {
        Ok(Ok(data)) => ("success", data),
        Ok(Err(err)) => {
            warn!(error = %err, "extraction failed; using fallback");
            ("fallback", EmergencyIntakeData::fallback())
        }
        Err(_) => {
            warn!(
                timeout_secs = state.intake.extraction_timeout.as_secs(),
                "extraction timed out; using fallback"
            );
            ("timeout", EmergencyIntakeData::fallback())
        }
    };

    state
        .metrics
        .intake_extractions_total
        .with_label_values(&[label])
        .inc();
    data
}

async fn locate(state: &AppState, data: &EmergencyIntakeData) -> Option<Coordinate> {
    let query = geocode_query(data);
    if query.is_empty() {
        return None;
    }

    match timeout(state.intake.geocode_timeout, state.geocoder.geocode(&query)).await {
        Ok(Ok(location)) => location,
        Ok(Err(err)) => {
            warn!(error = %err, "geocoding failed; continuing without coordinates");
            None
        }
        Err(_) => {
            warn!("geocoding timed out; continuing without coordinates");
            None
        }
    }
}

pub async fn handle_conversation(
    state: &AppState,
    ip: &str,
    messages: Vec<ChatMessage>,
    session_id: Option<String>,
) -> Result<IntakeOutcome, AppError> {
    if messages.is_empty() {
        return Err(AppError::BadRequest("messages array is required".to_string()));
    }

    let (session_id, delay_ms) = admit(state, ip, session_id)?;
    if state.intake.apply_progressive_delay && delay_ms > 0 {
        sleep(Duration::from_millis(delay_ms)).await;
    }

    let extracted = extract(state, &messages).await;
    let ai_response = compose_reply(&extracted);

    let mut outcome = IntakeOutcome {
        session_id,
        ai_response,
        emergency_id: None,
        delay_ms,
        match_ids: Vec::new(),
        extracted,
    };

    if !outcome.extracted.is_recordable() {
        return Ok(outcome);
    }

    let location = locate(state, &outcome.extracted).await;
    let emergency = emergency_from_intake(&outcome.extracted, location, &outcome.session_id);

    let emergency_id = match state.store.insert_emergency(emergency).await {
        Ok(id) => id,
        Err(err) => {
            error!(session_id = %outcome.session_id, error = %err, "failed to save emergency");
            return Ok(outcome);
        }
    };

    info!(%emergency_id, session_id = %outcome.session_id, "emergency recorded from intake");
    outcome.emergency_id = Some(emergency_id);
    state.limiter.end_session(&outcome.session_id);

    if state.intake.auto_match {
        match orchestrator::auto(state, emergency_id).await {
            Ok(result) => outcome.match_ids = result.match_ids,
            Err(err) => warn!(%emergency_id, error = %err, "auto-match after intake failed"),
        }
    }

    Ok(outcome)
}
