pub mod admin;
pub mod businesses;
pub mod emergencies;
pub mod intake;
pub mod matches;
pub mod volunteers;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(matches::router())
        .merge(intake::router())
        .merge(volunteers::router())
        .merge(businesses::router())
        .merge(emergencies::router())
        .merge(admin::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    tracked_addresses: usize,
    sessions: usize,
    emergencies: usize,
    volunteers: usize,
    businesses: usize,
    matches: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let (tracked_addresses, sessions) = state.limiter.counts();

    Ok(Json(HealthResponse {
        status: "ok",
        tracked_addresses,
        sessions,
        emergencies: state.store.list_emergencies().await?.len(),
        volunteers: state.store.list_volunteers(None).await?.len(),
        businesses: state.store.list_businesses(None).await?.len(),
        matches: state.store.list_matches(None).await?.len(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let (addresses, sessions) = state.limiter.counts();
    state.metrics.record_limiter_load(addresses, sessions);

    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
