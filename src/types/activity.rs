use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of user interaction recorded in the activity log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    View,
    Favorite,
    Unfavorite,
    TryApp,
    Search,
    Filter,
    TabChange,
    PageFocus,
    PageBlur,
    Click,
}

impl ActivityType {
    pub const ALL: [ActivityType; 10] = [
        ActivityType::View,
        ActivityType::Favorite,
        ActivityType::Unfavorite,
        ActivityType::TryApp,
        ActivityType::Search,
        ActivityType::Filter,
        ActivityType::TabChange,
        ActivityType::PageFocus,
        ActivityType::PageBlur,
        ActivityType::Click,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::View => "view",
            ActivityType::Favorite => "favorite",
            ActivityType::Unfavorite => "unfavorite",
            ActivityType::TryApp => "try_app",
            ActivityType::Search => "search",
            ActivityType::Filter => "filter",
            ActivityType::TabChange => "tab_change",
            ActivityType::PageFocus => "page_focus",
            ActivityType::PageBlur => "page_blur",
            ActivityType::Click => "click",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

/// An append-only activity log row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub activity_type: ActivityType,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub activity_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Payload for appending to the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewActivity {
    pub session_id: String,
    pub activity_type: ActivityType,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub activity_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
