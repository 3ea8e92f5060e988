use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::capability::ServiceSet;
use crate::models::volunteer::HelperStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub business_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub services_offered: ServiceSet,
    pub capacity: Option<u32>,
    pub current_load: u32,
    pub can_handle_critical: bool,
    pub availability_duration: Option<String>,
    pub status: HelperStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
