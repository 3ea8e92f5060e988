use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::security::sessions::{Session, SessionDecision, SessionRegistry, Touch};
use crate::security::{REQUEST_WINDOW, RateLimitConfig, SESSION_IDLE_TIMEOUT};

const BLOCKED_REASON: &str = "Too many violations. Temporary block active.";
const FOREIGN_SESSION_REASON: &str = "Session belongs to another client. Start a new conversation.";
const TOP_ADDRESSES: usize = 50;

/// Advisory delay by number of requests already seen in the window.
fn progressive_delay_ms(requests_in_window: usize) -> u64 {
    match requests_in_window {
        0 => 0,
        1 => 2_000,
        2 => 5_000,
        _ => 10_000,
    }
}

fn ceil_seconds(delta: TimeDelta) -> u64 {
    let millis = delta.num_milliseconds().max(0) as u64;
    millis.div_ceil(1_000)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { delay_ms: u64 },
    /// Hourly cap reached; a violation was recorded.
    Limited { reason: String, retry_after_seconds: u64 },
    /// Violation threshold reached; denied until the block window passes.
    Blocked { reason: String, retry_after_seconds: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateLimitDecision::Allowed { .. } => "allowed",
            RateLimitDecision::Limited { .. } => "limited",
            RateLimitDecision::Blocked { .. } => "blocked",
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            RateLimitDecision::Allowed { delay_ms } => Duration::from_millis(*delay_ms),
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct RateLimitEntry {
    timestamps: VecDeque<DateTime<Utc>>,
    session_ids: HashSet<String>,
    violations: u32,
    last_violation: Option<DateTime<Utc>>,
}

impl RateLimitEntry {
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - REQUEST_WINDOW;
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
    }

    fn requests_in_window(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - REQUEST_WINDOW;
        self.timestamps.iter().filter(|ts| **ts > cutoff).count()
    }

    fn block_remaining(&self, now: DateTime<Utc>, config: &RateLimitConfig) -> Option<TimeDelta> {
        if self.violations < config.violation_threshold {
            return None;
        }

        let until = self.last_violation? + config.block_duration();
        (now < until).then(|| until - now)
    }

    /// Violations are forgotten once a block window has passed since the last one.
    fn expire_violations(&mut self, now: DateTime<Utc>, config: &RateLimitConfig) {
        if let Some(last) = self.last_violation {
            if now >= last + config.block_duration() {
                self.violations = 0;
                self.last_violation = None;
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.timestamps.is_empty() && self.violations == 0 && self.session_ids.is_empty()
    }
}

#[derive(Debug)]
struct LimiterState {
    entries: HashMap<String, RateLimitEntry>,
    sessions: SessionRegistry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_addresses: usize,
    pub expired_sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySummary {
    #[serde(rename = "totalIPs")]
    pub total_ips: usize,
    pub total_sessions: usize,
    #[serde(rename = "blockedIPs")]
    pub blocked_ips: usize,
    pub active_violations: usize,
    pub recent_requests: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressActivity {
    pub ip: String,
    pub request_count: usize,
    pub session_count: usize,
    pub violations: u32,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecuritySnapshot {
    pub summary: SecuritySummary,
    pub ips: Vec<AddressActivity>,
    pub config: RateLimitConfig,
}

/// Per-address request, violation and session tracking.
///
/// Every public method takes the single state lock, does bounded in-memory work
/// and returns; nothing here awaits or touches I/O. The `*_at` variants take the
/// current time explicitly.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState {
                entries: HashMap::new(),
                sessions: SessionRegistry::new(SESSION_IDLE_TIMEOUT),
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check(&self, ip: &str) -> RateLimitDecision {
        self.check_at(ip, Utc::now())
    }

    pub fn check_at(&self, ip: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut state = self.lock();
        let entry = state.entries.entry(ip.to_string()).or_default();

        if let Some(remaining) = entry.block_remaining(now, &self.config) {
            return RateLimitDecision::Blocked {
                reason: BLOCKED_REASON.to_string(),
                retry_after_seconds: ceil_seconds(remaining),
            };
        }

        entry.expire_violations(now, &self.config);
        entry.prune(now);

        if entry.timestamps.len() >= self.config.max_requests_per_hour {
            entry.violations += 1;
            entry.last_violation = Some(now);

            let retry_after = entry
                .timestamps
                .front()
                .map_or(REQUEST_WINDOW, |oldest| *oldest + REQUEST_WINDOW - now);

            warn!(
                %ip,
                violations = entry.violations,
                "hourly request cap reached"
            );

            return RateLimitDecision::Limited {
                reason: format!(
                    "Rate limit exceeded. Maximum {} requests per hour.",
                    self.config.max_requests_per_hour
                ),
                retry_after_seconds: ceil_seconds(retry_after),
            };
        }

        let delay_ms = progressive_delay_ms(entry.timestamps.len());
        entry.timestamps.push_back(now);

        RateLimitDecision::Allowed { delay_ms }
    }

    /// Read-only block probe, applied to every intake turn including follow-ups.
    pub fn blocked(&self, ip: &str) -> Option<RateLimitDecision> {
        self.blocked_at(ip, Utc::now())
    }

    pub fn blocked_at(&self, ip: &str, now: DateTime<Utc>) -> Option<RateLimitDecision> {
        let state = self.lock();
        let remaining = state.entries.get(ip)?.block_remaining(now, &self.config)?;

        Some(RateLimitDecision::Blocked {
            reason: BLOCKED_REASON.to_string(),
            retry_after_seconds: ceil_seconds(remaining),
        })
    }

    pub fn create_session(&self, ip: &str, session_id: &str) -> SessionDecision {
        self.create_session_at(ip, session_id, Utc::now())
    }

    pub fn create_session_at(&self, ip: &str, session_id: &str, now: DateTime<Utc>) -> SessionDecision {
        let mut guard = self.lock();
        let LimiterState { entries, sessions } = &mut *guard;

        if let Some(existing) = sessions.get(session_id) {
            if sessions.is_live(session_id, now) {
                if existing.ip != ip {
                    warn!(%ip, "live session id presented by another address");
                    return SessionDecision::Denied {
                        reason: FOREIGN_SESSION_REASON.to_string(),
                    };
                }

                sessions.touch(session_id, now);
                return SessionDecision::Refreshed;
            }

            if let Some(stale) = sessions.remove(session_id) {
                if let Some(owner) = entries.get_mut(&stale.ip) {
                    owner.session_ids.remove(session_id);
                }
            }
        }

        let entry = entries.entry(ip.to_string()).or_default();
        entry
            .session_ids
            .retain(|id| sessions.is_live(id, now));

        if entry.session_ids.len() >= self.config.max_sessions_per_ip {
            return SessionDecision::Denied {
                reason: format!(
                    "Too many active sessions from this IP. Maximum {} allowed.",
                    self.config.max_sessions_per_ip
                ),
            };
        }

        sessions.insert(session_id, ip, now);
        entry.session_ids.insert(session_id.to_string());
        SessionDecision::Created
    }

    /// Refreshes activity; `false` means the session is unknown, has expired, or
    /// belongs to another address.
    pub fn update_session(&self, ip: &str, session_id: &str) -> bool {
        self.update_session_at(ip, session_id, Utc::now())
    }

    pub fn update_session_at(&self, ip: &str, session_id: &str, now: DateTime<Utc>) -> bool {
        let mut guard = self.lock();
        let LimiterState { entries, sessions } = &mut *guard;

        if sessions.get(session_id).is_some_and(|session| session.ip != ip) {
            return false;
        }

        match sessions.touch(session_id, now) {
            Touch::Refreshed => true,
            Touch::Expired(session) => {
                if let Some(owner) = entries.get_mut(&session.ip) {
                    owner.session_ids.remove(session_id);
                }
                false
            }
            Touch::Unknown => false,
        }
    }

    pub fn end_session(&self, session_id: &str) {
        let mut guard = self.lock();
        let LimiterState { entries, sessions } = &mut *guard;

        if let Some(session) = sessions.remove(session_id) {
            if let Some(owner) = entries.get_mut(&session.ip) {
                owner.session_ids.remove(session_id);
            }
        }
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Number of tracked addresses and live sessions.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.entries.len(), state.sessions.len())
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Prunes stale timestamps, expires idle sessions and forgets idle addresses.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut guard = self.lock();
        let LimiterState { entries, sessions } = &mut *guard;

        let expired = sessions.expire_idle(now);
        for (session_id, session) in &expired {
            if let Some(owner) = entries.get_mut(&session.ip) {
                owner.session_ids.remove(session_id);
            }
        }

        let before = entries.len();
        entries.retain(|_, entry| {
            entry.prune(now);
            entry.expire_violations(now, &self.config);
            !entry.is_idle()
        });

        let report = SweepReport {
            removed_addresses: before - entries.len(),
            expired_sessions: expired.len(),
        };
        debug!(
            removed_addresses = report.removed_addresses,
            expired_sessions = report.expired_sessions,
            "rate limiter swept"
        );
        report
    }

    pub fn snapshot(&self) -> SecuritySnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Read-only view for operators: summary plus the 50 noisiest addresses.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> SecuritySnapshot {
        let state = self.lock();

        let mut ips: Vec<AddressActivity> = state
            .entries
            .iter()
            .map(|(ip, entry)| AddressActivity {
                ip: ip.clone(),
                request_count: entry.requests_in_window(now),
                session_count: entry.session_ids.len(),
                violations: entry.violations,
                blocked: entry.block_remaining(now, &self.config).is_some(),
            })
            .collect();

        let summary = SecuritySummary {
            total_ips: state.entries.len(),
            total_sessions: state.sessions.len(),
            blocked_ips: ips.iter().filter(|activity| activity.blocked).count(),
            active_violations: ips.iter().filter(|activity| activity.violations > 0).count(),
            recent_requests: ips.iter().map(|activity| activity.request_count).sum(),
        };

        ips.sort_by(|a, b| {
            b.violations
                .cmp(&a.violations)
                .then_with(|| b.request_count.cmp(&a.request_count))
        });
        ips.truncate(TOP_ADDRESSES);

        SecuritySnapshot {
            summary,
            ips,
            config: self.config.clone(),
        }
    }
}
