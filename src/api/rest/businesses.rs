use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::volunteers::UpdateStatusRequest;
use crate::error::AppError;
use crate::geo::Coordinate;
use crate::models::business::Business;
use crate::models::capability::ServiceSet;
use crate::models::volunteer::HelperStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/businesses", post(create_business).get(list_businesses))
        .route("/businesses/:id/status", patch(update_business_status))
}

#[derive(Deserialize)]
pub struct CreateBusinessRequest {
    pub business_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub services_offered: ServiceSet,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub current_load: u32,
    #[serde(default)]
    pub can_handle_critical: bool,
    pub availability_duration: Option<String>,
}

async fn create_business(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBusinessRequest>,
) -> Result<Json<Business>, AppError> {
    if payload.business_name.trim().is_empty() {
        return Err(AppError::BadRequest("business_name cannot be empty".to_string()));
    }

    if payload
        .capacity
        .is_some_and(|capacity| payload.current_load > capacity)
    {
        return Err(AppError::BadRequest(
            "current_load cannot exceed capacity".to_string(),
        ));
    }

    if payload.location.is_some_and(|location| !location.is_valid()) {
        return Err(AppError::BadRequest("location is out of range".to_string()));
    }

    let now = Utc::now();
    let business = Business {
        id: Uuid::new_v4(),
        business_name: payload.business_name.trim().to_string(),
        contact_name: payload.contact_name,
        email: payload.email,
        phone: payload.phone,
        location: payload.location,
        services_offered: payload.services_offered,
        capacity: payload.capacity,
        current_load: payload.current_load,
        can_handle_critical: payload.can_handle_critical,
        availability_duration: payload.availability_duration,
        status: HelperStatus::Available,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_business(business.clone()).await?;
    Ok(Json(business))
}

async fn list_businesses(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Business>>, AppError> {
    Ok(Json(state.store.list_businesses(None).await?))
}

async fn update_business_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Business>, AppError> {
    let business = state
        .store
        .set_business_status(id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("business {} not found", id)))?;

    Ok(Json(business))
}
