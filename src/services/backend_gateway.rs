//! Backend gateway contract.
//!
//! Every store and aggregator talks to the backend through this trait. The
//! backend identifies the caller from its own auth state and performs all
//! capability checks itself; a cached role on the client is never trusted.

use std::sync::mpsc::Receiver;

use chrono::{DateTime, Utc};

use crate::types::activity::{ActivityLogEntry, NewActivity};
use crate::types::demo::{Demo, DemoUpdate, NewDemo};
use crate::types::errors::GatewayError;
use crate::types::favorite::{FavoriteEntry, FavoriteFolder, FavoriteLink, FolderUpdate, NewFolder};
use crate::types::profile::{AuthEvent, AuthUser, UserProfile, UserRole};
use crate::types::session::UserSession;

/// Result of a backend health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub schema_version: i32,
    pub demo_count: i64,
}

pub trait BackendGateway: Send + Sync {
    // ─── Health ───
    fn health_check(&self) -> Result<BackendStatus, GatewayError>;

    // ─── Auth ───
    fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<AuthUser, GatewayError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError>;
    fn sign_out(&self) -> Result<(), GatewayError>;
    fn current_user(&self) -> Option<AuthUser>;
    fn subscribe_auth_changes(&self) -> Receiver<AuthEvent>;
    /// Issues a one-time reset token. The reply looks the same whether or not
    /// the account exists; only a real account's token can be redeemed.
    fn request_password_reset(&self, email: &str) -> Result<String, GatewayError>;
    fn reset_password(&self, token: &str, new_password: &str) -> Result<(), GatewayError>;

    // ─── Profiles ───
    fn get_profile(&self, user_id: &str) -> Result<UserProfile, GatewayError>;
    fn list_profiles(&self) -> Result<Vec<UserProfile>, GatewayError>;
    fn set_user_role(&self, user_id: &str, role: UserRole) -> Result<UserProfile, GatewayError>;

    // ─── Demos ───
    fn list_demos(&self) -> Result<Vec<Demo>, GatewayError>;
    fn get_demo(&self, id: &str) -> Result<Demo, GatewayError>;
    fn insert_demo(&self, demo: &NewDemo) -> Result<Demo, GatewayError>;
    fn update_demo(&self, id: &str, update: &DemoUpdate) -> Result<Demo, GatewayError>;
    fn delete_demo(&self, id: &str) -> Result<(), GatewayError>;
    /// Atomically adds one view server-side and returns the new count.
    fn increment_page_views(&self, id: &str) -> Result<i64, GatewayError>;

    // ─── Favorites ───
    fn list_user_favorites(&self, user_id: &str) -> Result<Vec<FavoriteEntry>, GatewayError>;
    /// Favorites of every user that are filed into a global folder.
    fn list_global_folder_favorites(&self) -> Result<Vec<FavoriteEntry>, GatewayError>;
    fn add_favorite(&self, user_id: &str, demo_id: &str) -> Result<FavoriteLink, GatewayError>;
    fn remove_favorite(&self, user_id: &str, demo_id: &str) -> Result<(), GatewayError>;
    fn set_favorite_folder(&self, user_id: &str, demo_id: &str, folder_id: Option<&str>) -> Result<(), GatewayError>;

    // ─── Folders ───
    fn list_personal_folders(&self, user_id: &str) -> Result<Vec<FavoriteFolder>, GatewayError>;
    fn list_global_folders(&self) -> Result<Vec<FavoriteFolder>, GatewayError>;
    fn insert_folder(&self, folder: &NewFolder, is_global: bool) -> Result<FavoriteFolder, GatewayError>;
    fn update_folder(&self, id: &str, update: &FolderUpdate) -> Result<FavoriteFolder, GatewayError>;
    /// Detaches every favorite filed in the folder, then deletes the folder row.
    fn delete_folder(&self, id: &str) -> Result<(), GatewayError>;
    fn reorder_folders(&self, ordered_ids: &[String]) -> Result<(), GatewayError>;

    // ─── Telemetry ───
    fn insert_session(&self, session: &UserSession) -> Result<(), GatewayError>;
    fn close_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<(), GatewayError>;
    fn list_sessions(&self, user_id: Option<&str>) -> Result<Vec<UserSession>, GatewayError>;
    fn insert_activity(&self, activity: &NewActivity) -> Result<(), GatewayError>;
    fn list_activity(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ActivityLogEntry>, GatewayError>;

    // ─── Object storage ───
    fn upload_screenshot(&self, key: &str, bytes: &[u8]) -> Result<String, GatewayError>;
    fn delete_screenshot(&self, key: &str) -> Result<(), GatewayError>;
}
