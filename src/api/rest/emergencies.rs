use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::emergency::Emergency;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/emergencies", get(list_emergencies))
        .route("/emergencies/:id", get(get_emergency))
}

async fn list_emergencies(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Emergency>>, AppError> {
    Ok(Json(state.store.list_emergencies().await?))
}

async fn get_emergency(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Emergency>, AppError> {
    let emergency = state
        .store
        .get_emergency(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("emergency {} not found", id)))?;

    Ok(Json(emergency))
}
