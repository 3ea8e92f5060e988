use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolunteerScoreBreakdown {
    pub proximity: u32,
    pub skill_alignment: u32,
    pub general_skills: u32,
    pub availability: u32,
    pub capacity: u32,
    pub special_needs: u32,
}

impl VolunteerScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.proximity
            + self.skill_alignment
            + self.general_skills
            + self.availability
            + self.capacity
            + self.special_needs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessScoreBreakdown {
    pub proximity: u32,
    pub services: u32,
    pub capacity: u32,
    pub urgency: u32,
}

impl BusinessScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.proximity + self.services + self.capacity + self.urgency
    }
}

/// The one helper a match points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "HelperIds", try_from = "HelperIds")]
pub enum Helper {
    Volunteer(Uuid),
    Business(Uuid),
}

impl Helper {
    pub fn kind(&self) -> &'static str {
        match self {
            Helper::Volunteer(_) => "volunteer",
            Helper::Business(_) => "business",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Helper::Volunteer(id) | Helper::Business(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HelperIds {
    volunteer_id: Option<Uuid>,
    business_id: Option<Uuid>,
}

impl From<Helper> for HelperIds {
    fn from(helper: Helper) -> Self {
        match helper {
            Helper::Volunteer(id) => Self {
                volunteer_id: Some(id),
                business_id: None,
            },
            Helper::Business(id) => Self {
                volunteer_id: None,
                business_id: Some(id),
            },
        }
    }
}

impl TryFrom<HelperIds> for Helper {
    type Error = String;

    fn try_from(ids: HelperIds) -> Result<Self, Self::Error> {
        match (ids.volunteer_id, ids.business_id) {
            (Some(id), None) => Ok(Helper::Volunteer(id)),
            (None, Some(id)) => Ok(Helper::Business(id)),
            (Some(_), Some(_)) => Err("a match references a volunteer or a business, not both".into()),
            (None, None) => Err("a match must reference a volunteer or a business".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        use MatchStatus::*;

        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Accepted, Completed)
                | (Accepted, Cancelled)
        )
    }

    /// Statuses after which the helper no longer works this match.
    pub fn releases_helper(self) -> bool {
        matches!(
            self,
            MatchStatus::Declined | MatchStatus::Completed | MatchStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub rating: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub emergency_id: Uuid,
    #[serde(flatten)]
    pub helper: Helper,
    pub score: Option<u32>,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub feedback: Option<Feedback>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::{Helper, MatchStatus};

    #[test]
    fn helper_serializes_to_exclusive_ids() {
        let id = Uuid::from_u128(7);
        let value = serde_json::to_value(Helper::Business(id)).unwrap();
        assert_eq!(value["business_id"], json!(id));
        assert!(value["volunteer_id"].is_null());
    }

    #[test]
    fn helper_rejects_both_or_neither() {
        let both = json!({
            "volunteer_id": Uuid::from_u128(1),
            "business_id": Uuid::from_u128(2)
        });
        assert!(serde_json::from_value::<Helper>(both).is_err());

        let neither = json!({ "volunteer_id": null, "business_id": null });
        assert!(serde_json::from_value::<Helper>(neither).is_err());
    }

    #[test]
    fn terminal_statuses_do_not_transition() {
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Accepted));
        assert!(MatchStatus::Accepted.can_transition_to(MatchStatus::Completed));
        assert!(!MatchStatus::Pending.can_transition_to(MatchStatus::Completed));
        assert!(!MatchStatus::Completed.can_transition_to(MatchStatus::Cancelled));
        assert!(!MatchStatus::Declined.can_transition_to(MatchStatus::Accepted));
    }
}
