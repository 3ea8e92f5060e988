use std::time::Instant;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::AppError;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub match_actions_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub matches_created_total: IntCounterVec,
    pub rate_limit_decisions_total: IntCounterVec,
    pub intake_extractions_total: IntCounterVec,
    pub tracked_addresses: IntGauge,
    pub active_sessions: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let match_actions_total = IntCounterVec::new(
            Opts::new("match_actions_total", "Match actions by action and outcome"),
            &["action", "outcome"],
        )
        .expect("valid match_actions_total metric");

        let match_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "match_latency_seconds",
                "Latency of match actions in seconds",
            ),
            &["action"],
        )
        .expect("valid match_latency_seconds metric");

        let matches_created_total = IntCounterVec::new(
            Opts::new("matches_created_total", "Matches created by helper kind"),
            &["helper"],
        )
        .expect("valid matches_created_total metric");

        let rate_limit_decisions_total = IntCounterVec::new(
            Opts::new(
                "rate_limit_decisions_total",
                "Intake gate decisions by outcome",
            ),
            &["decision"],
        )
        .expect("valid rate_limit_decisions_total metric");

        let intake_extractions_total = IntCounterVec::new(
            Opts::new(
                "intake_extractions_total",
                "Conversation extractions by outcome",
            ),
            &["outcome"],
        )
        .expect("valid intake_extractions_total metric");

        let tracked_addresses = IntGauge::new(
            "rate_limit_tracked_addresses",
            "Source addresses currently tracked by the rate limiter",
        )
        .expect("valid rate_limit_tracked_addresses metric");

        let active_sessions = IntGauge::new("intake_active_sessions", "Live intake sessions")
            .expect("valid intake_active_sessions metric");

        registry
            .register(Box::new(match_actions_total.clone()))
            .expect("register match_actions_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(matches_created_total.clone()))
            .expect("register matches_created_total");
        registry
            .register(Box::new(rate_limit_decisions_total.clone()))
            .expect("register rate_limit_decisions_total");
        registry
            .register(Box::new(intake_extractions_total.clone()))
            .expect("register intake_extractions_total");
        registry
            .register(Box::new(tracked_addresses.clone()))
            .expect("register rate_limit_tracked_addresses");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register intake_active_sessions");

        Self {
            registry,
            match_actions_total,
            match_latency_seconds,
            matches_created_total,
            rate_limit_decisions_total,
            intake_extractions_total,
            tracked_addresses,
            active_sessions,
        }
    }

    pub fn observe_match_action(&self, action: &str, start: Instant, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.match_latency_seconds
            .with_label_values(&[action])
            .observe(start.elapsed().as_secs_f64());
        self.match_actions_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    pub fn record_limiter_load(&self, tracked_addresses: usize, active_sessions: usize) {
        self.tracked_addresses.set(tracked_addresses as i64);
        self.active_sessions.set(active_sessions as i64);
    }

    /// Prometheus text exposition of every registered series.
    pub fn render(&self) -> Result<String, AppError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|err| AppError::Internal(format!("failed to render metrics: {err}")))
    }
}
