use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::business::Business;
use crate::models::emergency::{Emergency, EmergencyStatus};
use crate::models::matching::Match;
use crate::models::volunteer::{HelperStatus, Volunteer};
use crate::store::{Claim, Store, StoreError};

struct Row<T> {
    seq: u64,
    value: T,
}

/// Listings come back in insertion order.
pub struct MemoryStore {
    seq: AtomicU64,
    emergencies: DashMap<Uuid, Row<Emergency>>,
    volunteers: DashMap<Uuid, Row<Volunteer>>,
    businesses: DashMap<Uuid, Row<Business>>,
    matches: DashMap<Uuid, Row<Match>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            emergencies: DashMap::new(),
            volunteers: DashMap::new(),
            businesses: DashMap::new(),
            matches: DashMap::new(),
        }
    }

    fn row<T>(&self, value: T) -> Row<T> {
        Row {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            value,
        }
    }
}

fn ordered<T: Clone>(table: &DashMap<Uuid, Row<T>>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut rows: Vec<(u64, T)> = table
        .iter()
        .filter(|entry| keep(&entry.value().value))
        .map(|entry| (entry.value().seq, entry.value().value.clone()))
        .collect();
    rows.sort_by_key(|(seq, _)| *seq);
    rows.into_iter().map(|(_, value)| value).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_emergency(&self, emergency: Emergency) -> Result<Uuid, StoreError> {
        let id = emergency.id;
        self.emergencies.insert(id, self.row(emergency));
        Ok(id)
    }

    async fn get_emergency(&self, id: Uuid) -> Result<Option<Emergency>, StoreError> {
        Ok(self.emergencies.get(&id).map(|row| row.value.clone()))
    }

    async fn list_emergencies(&self) -> Result<Vec<Emergency>, StoreError> {
        Ok(ordered(&self.emergencies, |_| true))
    }

    async fn latest_emergency_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Emergency>, StoreError> {
        Ok(self
            .emergencies
            .iter()
            .filter(|entry| entry.value().value.session_id.as_deref() == Some(session_id))
            .max_by_key(|entry| entry.value().seq)
            .map(|entry| entry.value().value.clone()))
    }

    async fn set_emergency_status(
        &self,
        id: Uuid,
        status: EmergencyStatus,
    ) -> Result<bool, StoreError> {
        match self.emergencies.get_mut(&id) {
            Some(mut row) => {
                row.value.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_volunteer(&self, volunteer: Volunteer) -> Result<Uuid, StoreError> {
        let id = volunteer.id;
        self.volunteers.insert(id, self.row(volunteer));
        Ok(id)
    }

    async fn list_volunteers(
        &self,
        status: Option<HelperStatus>,
    ) -> Result<Vec<Volunteer>, StoreError> {
        Ok(ordered(&self.volunteers, |volunteer| {
            status.is_none_or(|status| volunteer.status == status)
        }))
    }

    async fn set_volunteer_status(
        &self,
        id: Uuid,
        status: HelperStatus,
    ) -> Result<Option<Volunteer>, StoreError> {
        Ok(self.volunteers.get_mut(&id).map(|mut row| {
            row.value.status = status;
            row.value.updated_at = Utc::now();
            row.value.clone()
        }))
    }

    async fn claim_volunteer(&self, id: Uuid) -> Result<Claim, StoreError> {
        let Some(mut row) = self.volunteers.get_mut(&id) else {
            return Ok(Claim::Missing);
        };

        if row.value.status != HelperStatus::Available {
            return Ok(Claim::Unavailable);
        }

        row.value.status = HelperStatus::Busy;
        row.value.current_missions = row.value.current_missions.saturating_add(1);
        row.value.updated_at = Utc::now();
        Ok(Claim::Claimed)
    }

    async fn release_volunteer(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(mut row) = self.volunteers.get_mut(&id) {
            row.value.current_missions = row.value.current_missions.saturating_sub(1);
            if row.value.status == HelperStatus::Busy {
                row.value.status = HelperStatus::Available;
            }
            row.value.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_business(&self, business: Business) -> Result<Uuid, StoreError> {
        let id = business.id;
        self.businesses.insert(id, self.row(business));
        Ok(id)
    }

    async fn list_businesses(
        &self,
        status: Option<HelperStatus>,
    ) -> Result<Vec<Business>, StoreError> {
        Ok(ordered(&self.businesses, |business| {
            status.is_none_or(|status| business.status == status)
        }))
    }

    async fn set_business_status(
        &self,
        id: Uuid,
        status: HelperStatus,
    ) -> Result<Option<Business>, StoreError> {
        Ok(self.businesses.get_mut(&id).map(|mut row| {
            row.value.status = status;
            row.value.updated_at = Utc::now();
            row.value.clone()
        }))
    }

    async fn claim_business(&self, id: Uuid) -> Result<Claim, StoreError> {
        let Some(mut row) = self.businesses.get_mut(&id) else {
            return Ok(Claim::Missing);
        };

        if row.value.status != HelperStatus::Available {
            return Ok(Claim::Unavailable);
        }

        row.value.status = HelperStatus::Busy;
        row.value.updated_at = Utc::now();
        Ok(Claim::Claimed)
    }

    async fn release_business(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(mut row) = self.businesses.get_mut(&id) {
            if row.value.status == HelperStatus::Busy {
                row.value.status = HelperStatus::Available;
            }
            row.value.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_match(&self, record: Match) -> Result<Uuid, StoreError> {
        let id = record.id;
        self.matches.insert(id, self.row(record));
        Ok(id)
    }

    async fn get_match(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        Ok(self.matches.get(&id).map(|row| row.value.clone()))
    }

    async fn list_matches(&self, emergency_id: Option<Uuid>) -> Result<Vec<Match>, StoreError> {
        Ok(ordered(&self.matches, |record| {
            emergency_id.is_none_or(|id| record.emergency_id == id)
        }))
    }

    async fn update_match(&self, record: Match) -> Result<bool, StoreError> {
        match self.matches.get_mut(&record.id) {
            Some(mut row) => {
                row.value = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
