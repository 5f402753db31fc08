use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role held by a user. Capabilities are cumulative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            "super_admin" => Some(UserRole::SuperAdmin),
            _ => None,
        }
    }

    /// Admins and super-admins may add, edit and delete demos.
    pub fn can_manage_demos(&self) -> bool {
        *self >= UserRole::Admin
    }

    /// Only super-admins may manage global folders and roles.
    pub fn is_super_admin(&self) -> bool {
        *self == UserRole::SuperAdmin
    }
}

/// Profile row kept alongside each auth user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// The identity of a signed-in caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Auth state transitions delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "user", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
    PasswordRecovery(AuthUser),
}
