use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::intake::handle_conversation;
use crate::models::emergency::Emergency;
use crate::models::intake::{ChatMessage, EmergencyIntakeData};
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/intake", post(converse).get(session_emergency))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    pub success: bool,
    pub session_id: String,
    pub extracted_data: EmergencyIntakeData,
    pub ai_response: String,
    pub emergency_id: Option<Uuid>,
    pub is_complete: bool,
    pub delay_ms: u64,
    pub match_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct SessionEmergencyResponse {
    pub success: bool,
    pub emergency: Emergency,
}

/// First hop of `x-forwarded-for`, then `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok());

    forwarded
        .or(real_ip)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

async fn converse(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IntakeRequest>,
) -> Result<Json<IntakeResponse>, AppError> {
    let ip = client_ip(&headers);
    let outcome = handle_conversation(&state, &ip, payload.messages, payload.session_id).await?;

    Ok(Json(IntakeResponse {
        success: true,
        session_id: outcome.session_id,
        is_complete: outcome.extracted.is_complete,
        extracted_data: outcome.extracted,
        ai_response: outcome.ai_response,
        emergency_id: outcome.emergency_id,
        delay_ms: outcome.delay_ms,
        match_ids: outcome.match_ids,
    }))
}

async fn session_emergency(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionEmergencyResponse>, AppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("sessionId parameter is required".to_string()))?;

    let emergency = state
        .store
        .latest_emergency_for_session(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no emergency found for this session".to_string()))?;

    Ok(Json(SessionEmergencyResponse {
        success: true,
        emergency,
    }))
}
