use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::state::AppState;

/// Periodically prunes limiter state off the request path.
pub async fn run_sweeper(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "rate limiter sweeper started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&state);
    }
}

pub fn sweep_once(state: &AppState) {
    let report = state.limiter.sweep();
    let (addresses, sessions) = state.limiter.counts();
    state.metrics.record_limiter_load(addresses, sessions);

    if report.removed_addresses > 0 || report.expired_sessions > 0 {
        info!(
            removed_addresses = report.removed_addresses,
            expired_sessions = report.expired_sessions,
            tracked_addresses = addresses,
            "rate limiter state pruned"
        );
    }
}
