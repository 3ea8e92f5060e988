//! Persistence boundary for emergencies, helpers and matches.
//!
//! Handlers and the matching engine only see the [`Store`] trait; the crate ships
//! an in-process [`MemoryStore`] and a hosted database can be slotted in behind
//! the same interface.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::business::Business;
use crate::models::emergency::{Emergency, EmergencyStatus};
use crate::models::matching::Match;
use crate::models::volunteer::{HelperStatus, Volunteer};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Outcome of a compare-and-set claim on a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    Unavailable,
    Missing,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_emergency(&self, emergency: Emergency) -> Result<Uuid, StoreError>;
    async fn get_emergency(&self, id: Uuid) -> Result<Option<Emergency>, StoreError>;
    async fn list_emergencies(&self) -> Result<Vec<Emergency>, StoreError>;
    async fn latest_emergency_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Emergency>, StoreError>;
    /// Returns `false` when the emergency does not exist.
    async fn set_emergency_status(
        &self,
        id: Uuid,
        status: EmergencyStatus,
    ) -> Result<bool, StoreError>;

    async fn insert_volunteer(&self, volunteer: Volunteer) -> Result<Uuid, StoreError>;
    async fn list_volunteers(
        &self,
        status: Option<HelperStatus>,
    ) -> Result<Vec<Volunteer>, StoreError>;
    async fn set_volunteer_status(
        &self,
        id: Uuid,
        status: HelperStatus,
    ) -> Result<Option<Volunteer>, StoreError>;
    /// Marks the volunteer busy and counts the mission, only if still available.
    async fn claim_volunteer(&self, id: Uuid) -> Result<Claim, StoreError>;
    async fn release_volunteer(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_business(&self, business: Business) -> Result<Uuid, StoreError>;
    async fn list_businesses(
        &self,
        status: Option<HelperStatus>,
    ) -> Result<Vec<Business>, StoreError>;
    async fn set_business_status(
        &self,
        id: Uuid,
        status: HelperStatus,
    ) -> Result<Option<Business>, StoreError>;
    /// Marks the business busy, only if still available.
    async fn claim_business(&self, id: Uuid) -> Result<Claim, StoreError>;
    async fn release_business(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_match(&self, record: Match) -> Result<Uuid, StoreError>;
    async fn get_match(&self, id: Uuid) -> Result<Option<Match>, StoreError>;
    async fn list_matches(&self, emergency_id: Option<Uuid>) -> Result<Vec<Match>, StoreError>;
    /// Replaces a stored match; returns `false` when it does not exist.
    async fn update_match(&self, record: Match) -> Result<bool, StoreError>;
}
