use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::Coordinate;
use crate::models::capability::SkillSet;
use crate::models::volunteer::{Availability, HelperStatus, Volunteer};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/volunteers", post(create_volunteer).get(list_volunteers))
        .route("/volunteers/:id/status", patch(update_volunteer_status))
}

fn default_max_missions() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct CreateVolunteerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub skills: SkillSet,
    pub availability: Availability,
    #[serde(default = "default_max_missions")]
    pub max_concurrent_missions: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: HelperStatus,
}

async fn create_volunteer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVolunteerRequest>,
) -> Result<Json<Volunteer>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.max_concurrent_missions == 0 {
        return Err(AppError::BadRequest(
            "max_concurrent_missions must be > 0".to_string(),
        ));
    }

    if payload.location.is_some_and(|location| !location.is_valid()) {
        return Err(AppError::BadRequest("location is out of range".to_string()));
    }

    let now = Utc::now();
    let volunteer = Volunteer {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: payload.email,
        phone: payload.phone,
        location: payload.location,
        skills: payload.skills,
        availability: payload.availability,
        max_concurrent_missions: payload.max_concurrent_missions,
        current_missions: 0,
        status: HelperStatus::Available,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_volunteer(volunteer.clone()).await?;
    Ok(Json(volunteer))
}

async fn list_volunteers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Volunteer>>, AppError> {
    Ok(Json(state.store.list_volunteers(None).await?))
}

async fn update_volunteer_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Volunteer>, AppError> {
    let volunteer = state
        .store
        .set_volunteer_status(id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("volunteer {} not found", id)))?;

    Ok(Json(volunteer))
}
