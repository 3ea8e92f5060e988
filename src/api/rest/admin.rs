use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::security::SecuritySnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/security", get(security_overview))
}

#[derive(Serialize)]
pub struct SecurityResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: SecuritySnapshot,
}

async fn security_overview(State(state): State<Arc<AppState>>) -> Json<SecurityResponse> {
    Json(SecurityResponse {
        success: true,
        timestamp: Utc::now(),
        snapshot: state.limiter.snapshot(),
    })
}
