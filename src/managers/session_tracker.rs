//! Session and activity tracking.
//!
//! Every write here is best-effort: failures are logged and dropped so the
//! action being tracked is never interrupted.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::backend_gateway::BackendGateway;
use crate::types::activity::{ActivityType, NewActivity};
use crate::types::errors::TrackerError;
use crate::types::session::UserSession;

pub trait SessionTrackerTrait {
    /// Opens a session for the signed-in user. Returns its id when the backend accepted it.
    fn start_session(&mut self, user_id: &str, user_agent: &str, referrer: Option<&str>) -> Option<String>;
    fn end_session(&mut self);
    fn active_session(&self) -> Option<&UserSession>;
    fn track_view_demo(&self, demo_id: &str, title: &str);
    fn track_favorite(&self, demo_id: &str, favorited: bool);
    fn track_try_app(&self, demo_id: &str, url: &str);
    fn track_search(&self, query: &str, results: usize);
    fn track_filter(&self, kind: &str, value: &str);
    fn track_tab_change(&self, from: &str, to: &str);
    fn track_page_focus(&self);
    fn track_page_blur(&self);
    fn track_click(&self, target: &str, context: Value);
}

pub struct SessionTracker {
    gateway: Arc<dyn BackendGateway>,
    session: Option<UserSession>,
}

impl SessionTracker {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self {
            gateway,
            session: None,
        }
    }

    fn try_track(
        &self,
        activity_type: ActivityType,
        resource_type: &str,
        resource_id: Option<&str>,
        activity_data: Value,
    ) -> Result<(), TrackerError> {
        let session = self.session.as_ref().ok_or(TrackerError::NoActiveSession)?;
        let activity = NewActivity {
            session_id: session.session_id.clone(),
            activity_type,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.map(str::to_string),
            activity_data,
            timestamp: Utc::now(),
        };
        self.gateway.insert_activity(&activity)?;
        Ok(())
    }

    fn track(&self, activity_type: ActivityType, resource_type: &str, resource_id: Option<&str>, data: Value) {
        match self.try_track(activity_type, resource_type, resource_id, data) {
            Ok(()) => {}
            Err(TrackerError::NoActiveSession) => {
                debug!(activity = activity_type.as_str(), "no active session, event dropped");
            }
            Err(e) => {
                warn!(activity = activity_type.as_str(), error = %e, "activity log write failed");
            }
        }
    }
}

impl SessionTrackerTrait for SessionTracker {
    fn start_session(&mut self, user_id: &str, user_agent: &str, referrer: Option<&str>) -> Option<String> {
        if self.session.is_some() {
            self.end_session();
        }

        let session = UserSession {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            user_agent: user_agent.to_string(),
            referrer: referrer.map(str::to_string),
        };

        match self.gateway.insert_session(&session) {
            Ok(()) => {
                debug!(session_id = %session.session_id, "session started");
                let id = session.session_id.clone();
                self.session = Some(session);
                Some(id)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to start session");
                None
            }
        }
    }

    fn end_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match self.gateway.close_session(&session.session_id, Utc::now()) {
            Ok(()) => debug!(session_id = %session.session_id, "session ended"),
            Err(e) => warn!(session_id = %session.session_id, error = %e, "failed to end session"),
        }
    }

    fn active_session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    fn track_view_demo(&self, demo_id: &str, title: &str) {
        self.track(ActivityType::View, "demo", Some(demo_id), json!({ "demo_title": title }));
    }

    fn track_favorite(&self, demo_id: &str, favorited: bool) {
        let kind = if favorited {
            ActivityType::Favorite
        } else {
            ActivityType::Unfavorite
        };
        self.track(kind, "demo", Some(demo_id), json!({ "favorited": favorited }));
    }

    fn track_try_app(&self, demo_id: &str, url: &str) {
        self.track(ActivityType::TryApp, "demo", Some(demo_id), json!({ "app_url": url }));
    }

    fn track_search(&self, query: &str, results: usize) {
        self.track(
            ActivityType::Search,
            "search",
            None,
            json!({ "query": query, "results_count": results }),
        );
    }

    fn track_filter(&self, kind: &str, value: &str) {
        self.track(
            ActivityType::Filter,
            "filter",
            None,
            json!({ "filter_type": kind, "filter_value": value }),
        );
    }

    fn track_tab_change(&self, from: &str, to: &str) {
        self.track(
            ActivityType::TabChange,
            "tab",
            Some(to),
            json!({ "from_tab": from, "to_tab": to }),
        );
    }

    fn track_page_focus(&self) {
        self.track(ActivityType::PageFocus, "page", None, json!({}));
    }

    fn track_page_blur(&self) {
        self.track(ActivityType::PageBlur, "page", None, json!({}));
    }

    fn track_click(&self, target: &str, context: Value) {
        self.track(ActivityType::Click, "element", Some(target), context);
    }
}
