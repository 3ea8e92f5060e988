use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::capability::NeedSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    Flood,
    Fire,
    Earthquake,
    Hurricane,
    Layoff,
    Medical,
    Other,
}

/// Ordered severity: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Open,
    Matched,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emergency {
    pub id: Uuid,
    pub emergency_type: EmergencyType,
    pub urgency: Urgency,
    pub description: Option<String>,
    pub location: Option<Coordinate>,
    pub location_address: Option<String>,
    pub people_affected: Option<u32>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub has_elderly: bool,
    #[serde(default)]
    pub has_disabilities: bool,
    #[serde(default)]
    pub specific_needs: NeedSet,
    pub status: EmergencyStatus,
    pub requester_name: Option<String>,
    pub requester_phone: Option<String>,
    pub requester_email: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
