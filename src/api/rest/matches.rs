use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::finder::{BusinessCandidate, MatchCandidates, VolunteerCandidate};
use crate::engine::orchestrator::{self, resolve_helper};
use crate::error::AppError;
use crate::geo::round_km;
use crate::models::capability::{ServiceSet, SkillSet};
use crate::models::matching::{
    BusinessScoreBreakdown, Feedback, Match, MatchStatus, VolunteerScoreBreakdown,
};
use crate::models::volunteer::Availability;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/match", post(match_action).get(find_matches))
        .route("/matches", get(list_matches))
        .route("/matches/:id/status", patch(update_match_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchActionRequest {
    pub emergency_id: Option<String>,
    pub action: Option<String>,
    pub volunteer_id: Option<String>,
    pub business_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyQuery {
    pub emergency_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMatchStatusRequest {
    pub status: MatchStatus,
    pub feedback_rating: Option<u8>,
    pub feedback_notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerMatchView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: SkillSet,
    pub availability: Availability,
    pub score: u32,
    pub distance: Option<f64>,
    pub breakdown: VolunteerScoreBreakdown,
}

impl From<VolunteerCandidate> for VolunteerMatchView {
    fn from(candidate: VolunteerCandidate) -> Self {
        let volunteer = candidate.volunteer;
        Self {
            id: volunteer.id,
            name: volunteer.name,
            email: volunteer.email,
            phone: volunteer.phone,
            skills: volunteer.skills,
            availability: volunteer.availability,
            score: candidate.score,
            distance: candidate.distance_km.map(round_km),
            breakdown: candidate.breakdown,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMatchView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub services: ServiceSet,
    pub score: u32,
    pub distance: Option<f64>,
    pub breakdown: BusinessScoreBreakdown,
}

impl From<BusinessCandidate> for BusinessMatchView {
    fn from(candidate: BusinessCandidate) -> Self {
        let business = candidate.business;
        Self {
            id: business.id,
            name: business.business_name,
            email: business.email,
            phone: business.phone,
            services: business.services_offered,
            score: candidate.score,
            distance: candidate.distance_km.map(round_km),
            breakdown: candidate.breakdown,
        }
    }
}

#[derive(Serialize)]
pub struct FindResponse {
    pub success: bool,
    pub volunteers: Vec<VolunteerMatchView>,
    pub businesses: Vec<BusinessMatchView>,
}

impl From<MatchCandidates> for FindResponse {
    fn from(candidates: MatchCandidates) -> Self {
        Self {
            success: true,
            volunteers: candidates.volunteers.into_iter().map(Into::into).collect(),
            businesses: candidates.businesses.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub success: bool,
    pub match_id: Uuid,
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoResponse {
    pub success: bool,
    pub match_ids: Vec<Uuid>,
    pub message: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum MatchActionResponse {
    Find(FindResponse),
    Create(CreateResponse),
    Auto(AutoResponse),
}

fn parse_id(raw: Option<&str>, field: &str) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{field} must be a uuid"))),
        None => Ok(None),
    }
}

fn required_emergency_id(raw: Option<&str>) -> Result<Uuid, AppError> {
    parse_id(raw, "emergencyId")?
        .ok_or_else(|| AppError::BadRequest("emergencyId is required".to_string()))
}

async fn match_action(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MatchActionRequest>,
) -> Result<Json<MatchActionResponse>, AppError> {
    let emergency_id = required_emergency_id(payload.emergency_id.as_deref())?;

    match payload.action.as_deref().unwrap_or("find") {
        "find" => {
            let candidates = orchestrator::find(&state, emergency_id).await?;
            Ok(Json(MatchActionResponse::Find(candidates.into())))
        }
        "create" => {
            let helper = resolve_helper(
                parse_id(payload.volunteer_id.as_deref(), "volunteerId")?,
                parse_id(payload.business_id.as_deref(), "businessId")?,
            )?;
            let record = orchestrator::create(&state, emergency_id, helper).await?;
            Ok(Json(MatchActionResponse::Create(CreateResponse {
                success: true,
                match_id: record.id,
                message: "Match created successfully".to_string(),
            })))
        }
        "auto" => {
            let outcome = orchestrator::auto(&state, emergency_id).await?;
            Ok(Json(MatchActionResponse::Auto(AutoResponse {
                success: outcome.success,
                match_ids: outcome.match_ids,
                message: outcome.message,
            })))
        }
        other => Err(AppError::BadRequest(format!(
            "invalid action {other:?}; use \"find\", \"create\", or \"auto\""
        ))),
    }
}

async fn find_matches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmergencyQuery>,
) -> Result<Json<FindResponse>, AppError> {
    let emergency_id = required_emergency_id(query.emergency_id.as_deref())?;
    let candidates = orchestrator::find(&state, emergency_id).await?;
    Ok(Json(candidates.into()))
}

async fn list_matches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmergencyQuery>,
) -> Result<Json<Vec<Match>>, AppError> {
    let emergency_id = parse_id(query.emergency_id.as_deref(), "emergencyId")?;
    Ok(Json(state.store.list_matches(emergency_id).await?))
}

async fn update_match_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMatchStatusRequest>,
) -> Result<Json<Match>, AppError> {
    if payload.feedback_rating.is_some_and(|rating| !(1..=5).contains(&rating)) {
        return Err(AppError::BadRequest("feedbackRating must be 1-5".to_string()));
    }

    let feedback = (payload.feedback_rating.is_some() || payload.feedback_notes.is_some()).then(|| {
        Feedback {
            rating: payload.feedback_rating,
            notes: payload.feedback_notes,
        }
    });

    let record = orchestrator::update_status(&state, id, payload.status, feedback).await?;
    Ok(Json(record))
}
