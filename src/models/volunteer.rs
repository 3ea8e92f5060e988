use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::capability::SkillSet;

/// Shared by volunteers and businesses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HelperStatus {
    Available,
    Busy,
    Offline,
}

/// Readiness tiers, declared from most to least immediate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Immediate,
    Today,
    ThisWeek,
    Weekends,
    Weekdays,
}

impl Availability {
    /// `this_week` or anything sooner.
    pub fn within_week(self) -> bool {
        matches!(
            self,
            Availability::Immediate | Availability::Today | Availability::ThisWeek
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub skills: SkillSet,
    pub availability: Availability,
    pub max_concurrent_missions: u32,
    pub current_missions: u32,
    pub status: HelperStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Volunteer {
    pub fn has_capacity(&self) -> bool {
        self.max_concurrent_missions > self.current_missions
    }
}
