//! Abuse protection for the conversational intake endpoint.
//!
//! State lives in process memory behind one mutex, so limits hold per process
//! only. Running several intake replicas needs this state moved to a shared
//! cache first.

pub mod limiter;
pub mod sessions;
pub mod sweeper;

pub use limiter::{RateLimitDecision, RateLimiter, SecuritySnapshot};
pub use sessions::{Session, SessionDecision};

use chrono::TimeDelta;
use serde::Serialize;

/// Sliding window for the hourly request cap.
pub const REQUEST_WINDOW: TimeDelta = TimeDelta::minutes(60);
/// Sessions idle longer than this are dropped.
pub const SESSION_IDLE_TIMEOUT: TimeDelta = TimeDelta::minutes(120);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub max_requests_per_hour: usize,
    #[serde(rename = "maxSessionsPerIP")]
    pub max_sessions_per_ip: usize,
    /// Reported to operators but not consulted by any check.
    pub cooldown_minutes: i64,
    pub violation_threshold: u32,
    pub block_duration_minutes: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_hour: 5,
            max_sessions_per_ip: 3,
            cooldown_minutes: 30,
            violation_threshold: 3,
            block_duration_minutes: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn block_duration(&self) -> TimeDelta {
        TimeDelta::minutes(self.block_duration_minutes)
    }
}
