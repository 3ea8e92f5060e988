use std::sync::Arc;

use crate::intake::{DisabledExtractor, DisabledGeocoder, Extractor, Geocoder, IntakeSettings};
use crate::observability::metrics::Metrics;
use crate::security::{RateLimitConfig, RateLimiter};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub limiter: RateLimiter,
    pub extractor: Arc<dyn Extractor>,
    pub geocoder: Arc<dyn Geocoder>,
    pub intake: IntakeSettings,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, rate_limits: RateLimitConfig) -> Self {
        Self {
            store,
            limiter: RateLimiter::new(rate_limits),
            extractor: Arc::new(DisabledExtractor),
            geocoder: Arc::new(DisabledGeocoder),
            intake: IntakeSettings::default(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn with_intake_settings(mut self, intake: IntakeSettings) -> Self {
        self.intake = intake;
        self
    }
}
