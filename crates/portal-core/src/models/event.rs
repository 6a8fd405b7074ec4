use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::timezone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    PendingApproval,
    SentBack,
    Published,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Draft => write!(f, "Draft"),
            EventStatus::PendingApproval => write!(f, "Pending Approval"),
            EventStatus::SentBack => write!(f, "Sent Back"),
            EventStatus::Published => write!(f, "Published"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "draft" => Ok(EventStatus::Draft),
            "pending_approval" => Ok(EventStatus::PendingApproval),
            "sent_back" => Ok(EventStatus::SentBack),
            "published" => Ok(EventStatus::Published),
            other => Err(format!("Unknown event status: {}", other)),
        }
    }
}

impl EventStatus {
    /// Wire name, as used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::PendingApproval => "pending_approval",
            EventStatus::SentBack => "sent_back",
            EventStatus::Published => "published",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub date_time: String,
    pub location: Option<String>,
    pub registration_deadline: Option<String>,
    pub status: EventStatus,
    pub created_by: Option<String>,
    pub registration_form_schema: Option<Value>,
    pub max_capacity: Option<i64>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>,
    pub category: Option<String>,
    pub image_position: Option<String>,
    pub album_link: Option<String>,
    pub registration_link: Option<String>,
}

impl Event {
    /// "Wednesday, January 15, 2025 at 2:00 PM EST"
    pub fn formatted_date_time(&self) -> String {
        timezone::format_in_toronto(&self.date_time, timezone::DEFAULT_DISPLAY_FORMAT)
            .unwrap_or_else(|| self.date_time.chars().take(16).collect())
    }

    pub fn formatted_deadline(&self) -> Option<String> {
        self.registration_deadline.as_ref().map(|d| {
            timezone::format_in_toronto(d, timezone::DEFAULT_DISPLAY_FORMAT)
                .unwrap_or_else(|| d.chars().take(16).collect())
        })
    }

    pub fn location_display(&self) -> &str {
        self.location.as_deref().unwrap_or("TBD")
    }

    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

/// Body for `POST /events`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    /// UTC ISO-8601
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_form_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_link: Option<String>,
}

/// Body for `PATCH /events/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_form_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_link: Option<String>,
}

impl UpdateEventRequest {
    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| v.as_object().map(|o| o.is_empty()).unwrap_or(true))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}
