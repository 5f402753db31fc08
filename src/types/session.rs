use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded period of user activity.
///
/// `end_time` stays `None` when the client disappears without closing the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub user_agent: String,
    pub referrer: Option<String>,
}

impl UserSession {
    /// Duration in whole seconds, for closed sessions only.
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds().max(0))
    }
}
