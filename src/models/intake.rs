use serde::{Deserialize, Serialize};

use crate::models::capability::NeedSet;
use crate::models::emergency::{EmergencyType, Urgency};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Structured fields pulled out of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyIntakeData {
    pub emergency_type: EmergencyType,
    pub urgency: Urgency,
    pub location_address: String,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub requester_name: Option<String>,
    pub requester_phone: Option<String>,
    pub requester_email: Option<String>,
    pub people_affected: u32,
    pub has_children: bool,
    pub has_elderly: bool,
    pub has_disabilities: bool,
    pub specific_needs: NeedSet,
    pub additional_context: String,
    pub confidence: Confidence,
    pub missing_info: Vec<String>,
    pub follow_up_question: Option<String>,
    pub is_complete: bool,
}

pub const FALLBACK_QUESTION: &str = "I'm sorry, I'm having trouble processing your request. \
Could you please describe your emergency situation again? \
Include your location and what kind of help you need.";

impl EmergencyIntakeData {
    /// Substituted whenever extraction fails so the conversation can continue.
    pub fn fallback() -> Self {
        Self {
            emergency_type: EmergencyType::Other,
            urgency: Urgency::Medium,
            location_address: String::new(),
            location_city: None,
            location_state: None,
            requester_name: None,
            requester_phone: None,
            requester_email: None,
            people_affected: 0,
            has_children: false,
            has_elderly: false,
            has_disabilities: false,
            specific_needs: NeedSet::new(),
            additional_context: "Error processing request".to_string(),
            confidence: Confidence::Low,
            missing_info: vec!["all_information".to_string()],
            follow_up_question: Some(FALLBACK_QUESTION.to_string()),
            is_complete: false,
        }
    }

    /// Complete, trusted and reachable enough to record as an emergency.
    pub fn is_recordable(&self) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        self.is_complete
            && self.confidence != Confidence::Low
            && present(&self.location_city)
            && present(&self.requester_name)
            && present(&self.requester_phone)
    }

    pub fn display_location(&self) -> &str {
        if !self.location_address.trim().is_empty() {
            return &self.location_address;
        }
        self.location_city.as_deref().unwrap_or_default()
    }
}
