//! SQLite implementation of [`BackendGateway`].
//!
//! One [`SqliteGateway`] is one client session against a shared backend. The
//! backend (database, object store, password hashing) sits behind an `Arc`, so
//! [`SqliteGateway::client`] hands out further independent clients (another
//! user, another browser tab) that see the same rows.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::connection::Database;
use crate::database::migrations;
use crate::services::backend_gateway::{BackendGateway, BackendStatus};
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait};
use crate::services::object_storage::ObjectStorage;
use crate::types::activity::{ActivityLogEntry, ActivityType, NewActivity};
use crate::types::config::{AppConfig, BackendUrl};
use crate::types::demo::{normalize_tags, Demo, DemoLinks, DemoStatus, DemoUpdate, NewDemo};
use crate::types::errors::GatewayError;
use crate::types::favorite::{
    FavoriteEntry, FavoriteFolder, FavoriteLink, FolderUpdate, NewFolder, DEFAULT_FOLDER_COLOR,
    MAX_FOLDER_NAME_LEN,
};
use crate::types::profile::{AuthEvent, AuthUser, UserProfile, UserRole};
use crate::types::session::UserSession;

const MIN_PASSWORD_LEN: usize = 6;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const DEMO_COLUMNS: &str = "id, title, description, tags, owner, page_views, is_featured, status, \
     created_by, app_url, design_url, docs_url, resource_url, screenshot_url, video_url, \
     created_at, updated_at";

const JOINED_DEMO_COLUMNS: &str = "d.id, d.title, d.description, d.tags, d.owner, d.page_views, \
     d.is_featured, d.status, d.created_by, d.app_url, d.design_url, d.docs_url, d.resource_url, \
     d.screenshot_url, d.video_url, d.created_at, d.updated_at";

const FOLDER_COLUMNS: &str =
    "id, name, description, color, is_global, created_by, sort_order, created_at";

/// Settings for opening a backend.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub api_key: String,
    pub storage_dir: PathBuf,
    pub password_iterations: u32,
}

impl From<&AppConfig> for GatewayOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            storage_dir: config.storage_dir.clone(),
            password_iterations: config.password_iterations,
        }
    }
}

struct Backend {
    db: Mutex<Database>,
    storage: ObjectStorage,
    crypto: CryptoService,
    api_key: String,
}

pub struct SqliteGateway {
    backend: Arc<Backend>,
    auth: Mutex<Option<AuthUser>>,
    listeners: Mutex<Vec<Sender<AuthEvent>>>,
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn lock_poisoned<E: std::fmt::Display>(e: E) -> GatewayError {
    GatewayError::Database(format!("backend lock poisoned: {}", e))
}

/// Reads a demo whose columns start at `offset`.
fn row_to_demo_at(row: &Row, offset: usize) -> rusqlite::Result<Demo> {
    let tags_json: String = row.get(offset + 3)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 3, Type::Text, Box::new(e))
    })?;
    let status: String = row.get(offset + 7)?;

    Ok(Demo {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        tags,
        owner: row.get(offset + 4)?,
        page_views: row.get(offset + 5)?,
        is_featured: row.get(offset + 6)?,
        status: DemoStatus::parse(&status).unwrap_or_default(),
        created_by: row.get(offset + 8)?,
        links: DemoLinks {
            app_url: row.get(offset + 9)?,
            design_url: row.get(offset + 10)?,
            docs_url: row.get(offset + 11)?,
            resource_url: row.get(offset + 12)?,
            screenshot_url: row.get(offset + 13)?,
            video_url: row.get(offset + 14)?,
        },
        created_at: from_millis(row.get(offset + 15)?),
        updated_at: from_millis(row.get(offset + 16)?),
    })
}

fn row_to_demo(row: &Row) -> rusqlite::Result<Demo> {
    row_to_demo_at(row, 0)
}

/// Reads `user_id, demo_id, folder_id, created_at` followed by joined demo columns.
fn row_to_favorite_entry(row: &Row) -> rusqlite::Result<FavoriteEntry> {
    Ok(FavoriteEntry {
        link: FavoriteLink {
            user_id: row.get(0)?,
            demo_id: row.get(1)?,
            folder_id: row.get(2)?,
            created_at: from_millis(row.get(3)?),
        },
        demo: row_to_demo_at(row, 4)?,
    })
}

fn row_to_folder(row: &Row) -> rusqlite::Result<FavoriteFolder> {
    Ok(FavoriteFolder {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        is_global: row.get(4)?,
        created_by: row.get(5)?,
        sort_order: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

fn row_to_profile(row: &Row) -> rusqlite::Result<UserProfile> {
    let role: String = row.get(3)?;
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: UserRole::parse(&role).unwrap_or_default(),
        created_at: from_millis(row.get(4)?),
        last_login: row.get::<_, Option<i64>>(5)?.map(from_millis),
    })
}

fn row_to_session(row: &Row) -> rusqlite::Result<UserSession> {
    Ok(UserSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        start_time: from_millis(row.get(2)?),
        end_time: row.get::<_, Option<i64>>(3)?.map(from_millis),
        user_agent: row.get(4)?,
        referrer: row.get(5)?,
    })
}

fn row_to_activity(row: &Row) -> rusqlite::Result<ActivityLogEntry> {
    let kind: String = row.get(3)?;
    let activity_type = ActivityType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown activity type: {}", kind).into(),
        )
    })?;
    let data: String = row.get(6)?;
    let activity_data = serde_json::from_str(&data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(ActivityLogEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        activity_type,
        resource_type: row.get(4)?,
        resource_id: row.get(5)?,
        activity_data,
        timestamp: from_millis(row.get(7)?),
    })
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>, GatewayError> {
    rows.map(|r| r.map_err(GatewayError::from)).collect()
}

fn validate_folder_name(name: &str) -> Result<String, GatewayError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GatewayError::Validation("folder name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(GatewayError::Validation(format!(
            "folder name longer than {} characters",
            MAX_FOLDER_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_password(password: &str) -> Result<(), GatewayError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(GatewayError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl SqliteGateway {
    /// Opens the backend at `url` and returns a signed-out client for it.
    ///
    /// The first client to open a backend registers its API key; later clients
    /// presenting a different key are rejected.
    pub fn open(url: &BackendUrl, options: GatewayOptions) -> Result<Self, GatewayError> {
        if options.api_key.trim().is_empty() {
            return Err(GatewayError::Unauthorized("missing API key".to_string()));
        }

        let db = Database::open_url(url)?;
        Self::register_api_key(db.connection(), &options.api_key)?;

        let backend = Backend {
            db: Mutex::new(db),
            storage: ObjectStorage::new(&options.storage_dir),
            crypto: CryptoService::new(options.password_iterations)?,
            api_key: options.api_key,
        };
        info!(?url, "backend opened");

        Ok(Self {
            backend: Arc::new(backend),
            auth: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        Self::open(&config.backend_url, GatewayOptions::from(config))
    }

    /// A new signed-out client sharing this client's backend.
    pub fn client(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            auth: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn register_api_key(conn: &Connection, api_key: &str) -> Result<(), GatewayError> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM backend_meta WHERE key = 'api_key'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(existing) if existing != api_key => {
                Err(GatewayError::Unauthorized("API key rejected".to_string()))
            }
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO backend_meta (key, value) VALUES ('api_key', ?1)",
                    params![api_key],
                )?;
                Ok(())
            }
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let db = self.backend.db.lock().map_err(lock_poisoned)?;
        f(db.connection())
    }

    fn require_user(&self) -> Result<AuthUser, GatewayError> {
        self.current_user()
            .ok_or_else(|| GatewayError::Unauthorized("sign in required".to_string()))
    }

    /// Requires the signed-in caller to be `user_id`.
    fn require_self(&self, user_id: &str) -> Result<AuthUser, GatewayError> {
        let user = self.require_user()?;
        if user.id != user_id {
            return Err(GatewayError::Forbidden(
                "cannot act on another user's data".to_string(),
            ));
        }
        Ok(user)
    }

    /// Reads the caller's role from the profile table on every call.
    fn role_of(conn: &Connection, user_id: &str) -> Result<UserRole, GatewayError> {
        let role: Option<String> = conn
            .query_row(
                "SELECT role FROM user_profiles WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role.and_then(|r| UserRole::parse(&r)).unwrap_or_default())
    }

    /// Drafts are visible to admins and super-admins only.
    fn sees_drafts(&self, conn: &Connection) -> Result<bool, GatewayError> {
        match self.current_user() {
            Some(user) => Ok(Self::role_of(conn, &user.id)?.can_manage_demos()),
            None => Ok(false),
        }
    }

    fn require_role(
        &self,
        conn: &Connection,
        predicate: fn(&UserRole) -> bool,
        action: &str,
    ) -> Result<AuthUser, GatewayError> {
        let user = self.require_user()?;
        let role = Self::role_of(conn, &user.id)?;
        if !predicate(&role) {
            return Err(GatewayError::Forbidden(format!(
                "{} requires a higher role than {}",
                action,
                role.as_str()
            )));
        }
        Ok(user)
    }

    fn set_auth(&self, user: Option<AuthUser>) -> Result<(), GatewayError> {
        let mut auth = self.auth.lock().map_err(lock_poisoned)?;
        *auth = user;
        Ok(())
    }

    fn emit(&self, event: AuthEvent) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn fetch_folder(conn: &Connection, id: &str) -> Result<FavoriteFolder, GatewayError> {
        conn.query_row(
            &format!("SELECT {} FROM favorite_folders WHERE id = ?1", FOLDER_COLUMNS),
            params![id],
            row_to_folder,
        )
        .optional()?
        .ok_or_else(|| GatewayError::NotFound(format!("folder {}", id)))
    }

    /// Owner for personal folders, super-admin for global ones.
    fn require_folder_write(&self, conn: &Connection, folder_id: &str) -> Result<FavoriteFolder, GatewayError> {
        let user = self.require_user()?;
        let folder = Self::fetch_folder(conn, folder_id)?;
        if folder.is_global {
            self.require_role(conn, UserRole::is_super_admin, "managing global folders")?;
        } else {
            let owner: Option<String> = conn.query_row(
                "SELECT user_id FROM favorite_folders WHERE id = ?1",
                params![folder_id],
                |row| row.get(0),
            )?;
            if owner.as_deref() != Some(user.id.as_str()) {
                return Err(GatewayError::Forbidden(format!(
                    "folder {} belongs to another user",
                    folder_id
                )));
            }
        }
        Ok(folder)
    }

    fn fetch_demo(conn: &Connection, id: &str) -> Result<Demo, GatewayError> {
        conn.query_row(
            &format!("SELECT {} FROM demos WHERE id = ?1", DEMO_COLUMNS),
            params![id],
            row_to_demo,
        )
        .optional()?
        .ok_or_else(|| GatewayError::NotFound(format!("demo {}", id)))
    }

    fn fetch_profile(conn: &Connection, user_id: &str) -> Result<UserProfile, GatewayError> {
        conn.query_row(
            "SELECT id, email, display_name, role, created_at, last_login \
             FROM user_profiles WHERE id = ?1",
            params![user_id],
            row_to_profile,
        )
        .optional()?
        .ok_or_else(|| GatewayError::NotFound(format!("profile {}", user_id)))
    }
}

impl BackendGateway for SqliteGateway {
    fn health_check(&self) -> Result<BackendStatus, GatewayError> {
        self.with_conn(|conn| {
            Self::register_api_key(conn, &self.backend.api_key)?;
            let demo_count: i64 = conn.query_row("SELECT COUNT(*) FROM demos", [], |row| row.get(0))?;
            Ok(BackendStatus {
                schema_version: migrations::get_schema_version(conn),
                demo_count,
            })
        })
    }

    // ─── Auth ───

    fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<AuthUser, GatewayError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(GatewayError::Validation(format!("invalid email: {}", email)));
        }
        validate_password(password)?;
        let display_name = match display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let hashed = self.backend.crypto.hash_password(password)?;
        let id = Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM auth_users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(GatewayError::Conflict(format!("email already registered: {}", email)));
            }
            // The first account on an empty backend bootstraps as super-admin.
            let profiles: i64 = tx.query_row("SELECT COUNT(*) FROM user_profiles", [], |row| row.get(0))?;
            let role = if profiles == 0 { UserRole::SuperAdmin } else { UserRole::User };

            tx.execute(
                "INSERT INTO auth_users (id, email, password_hash, salt, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, email, hashed.hash, hashed.salt, now],
            )?;
            tx.execute(
                "INSERT INTO user_profiles (id, email, display_name, role, created_at, last_login) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, email, display_name, role.as_str(), now],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        let user = AuthUser { id, email };
        self.set_auth(Some(user.clone()))?;
        self.emit(AuthEvent::SignedIn(user.clone()));
        debug!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        let email = email.trim().to_lowercase();
        let user = self.with_conn(|conn| {
            let row: Option<(String, Vec<u8>, Vec<u8>)> = conn
                .query_row(
                    "SELECT id, password_hash, salt FROM auth_users WHERE email = ?1",
                    params![email],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (id, hash, salt) = row
                .ok_or_else(|| GatewayError::Unauthorized("invalid login credentials".to_string()))?;
            if !self.backend.crypto.verify_password(password, &salt, &hash) {
                return Err(GatewayError::Unauthorized("invalid login credentials".to_string()));
            }
            conn.execute(
                "UPDATE user_profiles SET last_login = ?1 WHERE id = ?2",
                params![to_millis(Utc::now()), id],
            )?;
            Ok(AuthUser { id, email: email.clone() })
        })?;

        self.set_auth(Some(user.clone()))?;
        self.emit(AuthEvent::SignedIn(user.clone()));
        debug!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    fn sign_out(&self) -> Result<(), GatewayError> {
        let was_signed_in = self.current_user().is_some();
        self.set_auth(None)?;
        if was_signed_in {
            self.emit(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.auth.lock().ok().and_then(|auth| auth.clone())
    }

    fn subscribe_auth_changes(&self) -> Receiver<AuthEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    fn request_password_reset(&self, email: &str) -> Result<String, GatewayError> {
        let email = email.trim().to_lowercase();
        let token = self.backend.crypto.generate_token()?;
        let expires_at = to_millis(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES));

        // Unknown addresses still get a token; it is never stored.
        self.with_conn(|conn| {
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT id FROM auth_users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            match user_id {
                Some(user_id) => {
                    conn.execute(
                        "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                        params![token, user_id, expires_at],
                    )?;
                }
                None => debug!("password reset requested for unknown address"),
            }
            Ok(())
        })?;
        Ok(token)
    }

    fn reset_password(&self, token: &str, new_password: &str) -> Result<(), GatewayError> {
        validate_password(new_password)?;
        let hashed = self.backend.crypto.hash_password(new_password)?;
        let now = to_millis(Utc::now());

        let user = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let user: Option<(String, String)> = tx
                .query_row(
                    "SELECT t.user_id, u.email FROM password_reset_tokens t \
                     JOIN auth_users u ON u.id = t.user_id \
                     WHERE t.token = ?1 AND t.used = 0 AND t.expires_at > ?2",
                    params![token, now],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (user_id, email) = user
                .ok_or_else(|| GatewayError::Unauthorized("reset token invalid or expired".to_string()))?;
            tx.execute(
                "UPDATE auth_users SET password_hash = ?1, salt = ?2 WHERE id = ?3",
                params![hashed.hash, hashed.salt, user_id],
            )?;
            tx.execute(
                "UPDATE password_reset_tokens SET used = 1 WHERE token = ?1",
                params![token],
            )?;
            tx.commit()?;
            Ok(AuthUser { id: user_id, email })
        })?;

        self.emit(AuthEvent::PasswordRecovery(user));
        Ok(())
    }

    // ─── Profiles ───

    fn get_profile(&self, user_id: &str) -> Result<UserProfile, GatewayError> {
        self.require_user()?;
        self.with_conn(|conn| Self::fetch_profile(conn, user_id))
    }

    fn list_profiles(&self) -> Result<Vec<UserProfile>, GatewayError> {
        self.with_conn(|conn| {
            self.require_role(conn, UserRole::can_manage_demos, "listing users")?;
            let mut stmt = conn.prepare(
                "SELECT id, email, display_name, role, created_at, last_login \
                 FROM user_profiles ORDER BY created_at",
            )?;
            let rows = stmt.query_map([], row_to_profile)?;
            collect(rows)
        })
    }

    fn set_user_role(&self, user_id: &str, role: UserRole) -> Result<UserProfile, GatewayError> {
        self.with_conn(|conn| {
            self.require_role(conn, UserRole::is_super_admin, "changing roles")?;
            let affected = conn.execute(
                "UPDATE user_profiles SET role = ?1 WHERE id = ?2",
                params![role.as_str(), user_id],
            )?;
            if affected == 0 {
                return Err(GatewayError::NotFound(format!("profile {}", user_id)));
            }
            Self::fetch_profile(conn, user_id)
        })
    }

    // ─── Demos ───

    fn list_demos(&self) -> Result<Vec<Demo>, GatewayError> {
        self.with_conn(|conn| {
            let drafts = self.sees_drafts(conn)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM demos WHERE (?1 OR status = 'published') ORDER BY created_at DESC, id",
                DEMO_COLUMNS
            ))?;
            let rows = stmt.query_map(params![drafts], row_to_demo)?;
            collect(rows)
        })
    }

    fn get_demo(&self, id: &str) -> Result<Demo, GatewayError> {
        self.with_conn(|conn| {
            let demo = Self::fetch_demo(conn, id)?;
            if !demo.status.is_published() && !self.sees_drafts(conn)? {
                return Err(GatewayError::NotFound(format!("demo {}", id)));
            }
            Ok(demo)
        })
    }

    fn insert_demo(&self, demo: &NewDemo) -> Result<Demo, GatewayError> {
        let title = demo.title.trim();
        let owner = demo.owner.trim();
        if title.is_empty() {
            return Err(GatewayError::Validation("demo title cannot be empty".to_string()));
        }
        if owner.is_empty() {
            return Err(GatewayError::Validation("demo owner cannot be empty".to_string()));
        }
        let tags = serde_json::to_string(&normalize_tags(&demo.tags))?;
        let id = Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        self.with_conn(|conn| {
            let user = self.require_role(conn, UserRole::can_manage_demos, "adding demos")?;
            let links = &demo.links;
            conn.execute(
                "INSERT INTO demos (id, title, description, tags, owner, page_views, is_featured, status, \
                 created_by, app_url, design_url, docs_url, resource_url, screenshot_url, video_url, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                params![
                    id,
                    title,
                    demo.description,
                    tags,
                    owner,
                    demo.is_featured,
                    demo.status.as_str(),
                    user.id,
                    links.app_url,
                    links.design_url,
                    links.docs_url,
                    links.resource_url,
                    links.screenshot_url,
                    links.video_url,
                    now
                ],
            )?;
            Self::fetch_demo(conn, &id)
        })
    }

    fn update_demo(&self, id: &str, update: &DemoUpdate) -> Result<Demo, GatewayError> {
        if matches!(&update.title, Some(t) if t.trim().is_empty()) {
            return Err(GatewayError::Validation("demo title cannot be empty".to_string()));
        }
        if matches!(&update.owner, Some(o) if o.trim().is_empty()) {
            return Err(GatewayError::Validation("demo owner cannot be empty".to_string()));
        }

        self.with_conn(|conn| {
            self.require_role(conn, UserRole::can_manage_demos, "editing demos")?;
            let mut demo = Self::fetch_demo(conn, id)?;
            update.apply_to(&mut demo);
            demo.title = demo.title.trim().to_string();
            demo.owner = demo.owner.trim().to_string();
            demo.tags = normalize_tags(&demo.tags);
            let tags = serde_json::to_string(&demo.tags)?;
            let links = &demo.links;

            conn.execute(
                "UPDATE demos SET title = ?1, description = ?2, tags = ?3, owner = ?4, is_featured = ?5, \
                 status = ?6, app_url = ?7, design_url = ?8, docs_url = ?9, resource_url = ?10, \
                 screenshot_url = ?11, video_url = ?12, updated_at = ?13 WHERE id = ?14",
                params![
                    demo.title,
                    demo.description,
                    tags,
                    demo.owner,
                    demo.is_featured,
                    demo.status.as_str(),
                    links.app_url,
                    links.design_url,
                    links.docs_url,
                    links.resource_url,
                    links.screenshot_url,
                    links.video_url,
                    to_millis(Utc::now()),
                    id
                ],
            )?;
            Self::fetch_demo(conn, id)
        })
    }

    fn delete_demo(&self, id: &str) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            self.require_role(conn, UserRole::can_manage_demos, "deleting demos")?;
            // user_favorites rows go with it through ON DELETE CASCADE.
            let affected = conn.execute("DELETE FROM demos WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(GatewayError::NotFound(format!("demo {}", id)));
            }
            Ok(())
        })
    }

    fn increment_page_views(&self, id: &str) -> Result<i64, GatewayError> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE demos SET page_views = page_views + 1 WHERE id = ?1 RETURNING page_views",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| GatewayError::NotFound(format!("demo {}", id)))
        })
    }

    // ─── Favorites ───

    fn list_user_favorites(&self, user_id: &str) -> Result<Vec<FavoriteEntry>, GatewayError> {
        self.require_self(user_id)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT f.user_id, f.demo_id, f.folder_id, f.created_at, {} \
                 FROM user_favorites f JOIN demos d ON d.id = f.demo_id \
                 WHERE f.user_id = ?1 ORDER BY f.created_at DESC, f.demo_id",
                JOINED_DEMO_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_favorite_entry)?;
            collect(rows)
        })
    }

    fn list_global_folder_favorites(&self) -> Result<Vec<FavoriteEntry>, GatewayError> {
        self.require_user()?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT f.user_id, f.demo_id, f.folder_id, f.created_at, {} \
                 FROM user_favorites f \
                 JOIN favorite_folders g ON g.id = f.folder_id AND g.is_global = 1 \
                 JOIN demos d ON d.id = f.demo_id \
                 ORDER BY f.created_at DESC, f.demo_id",
                JOINED_DEMO_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_favorite_entry)?;
            collect(rows)
        })
    }

    fn add_favorite(&self, user_id: &str, demo_id: &str) -> Result<FavoriteLink, GatewayError> {
        self.require_self(user_id)?;
        let created_at = Utc::now();
        self.with_conn(|conn| {
            Self::fetch_demo(conn, demo_id)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_favorites (user_id, demo_id, folder_id, created_at) \
                 VALUES (?1, ?2, NULL, ?3)",
                params![user_id, demo_id, to_millis(created_at)],
            )?;
            if inserted == 0 {
                return Err(GatewayError::Conflict(format!("demo {} already favorited", demo_id)));
            }
            Ok(FavoriteLink {
                user_id: user_id.to_string(),
                demo_id: demo_id.to_string(),
                folder_id: None,
                created_at: from_millis(to_millis(created_at)),
            })
        })
    }

    fn remove_favorite(&self, user_id: &str, demo_id: &str) -> Result<(), GatewayError> {
        self.require_self(user_id)?;
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM user_favorites WHERE user_id = ?1 AND demo_id = ?2",
                params![user_id, demo_id],
            )?;
            if affected == 0 {
                return Err(GatewayError::NotFound(format!("favorite {}", demo_id)));
            }
            Ok(())
        })
    }

    fn set_favorite_folder(&self, user_id: &str, demo_id: &str, folder_id: Option<&str>) -> Result<(), GatewayError> {
        self.require_self(user_id)?;
        self.with_conn(|conn| {
            if let Some(fid) = folder_id {
                let folder = Self::fetch_folder(conn, fid)?;
                if !folder.is_global {
                    let owner: Option<String> = conn.query_row(
                        "SELECT user_id FROM favorite_folders WHERE id = ?1",
                        params![fid],
                        |row| row.get(0),
                    )?;
                    if owner.as_deref() != Some(user_id) {
                        return Err(GatewayError::Forbidden(format!(
                            "folder {} belongs to another user",
                            fid
                        )));
                    }
                }
            }
            let affected = conn.execute(
                "UPDATE user_favorites SET folder_id = ?1 WHERE user_id = ?2 AND demo_id = ?3",
                params![folder_id, user_id, demo_id],
            )?;
            if affected == 0 {
                return Err(GatewayError::NotFound(format!("favorite {}", demo_id)));
            }
            Ok(())
        })
    }

    // ─── Folders ───

    fn list_personal_folders(&self, user_id: &str) -> Result<Vec<FavoriteFolder>, GatewayError> {
        self.require_self(user_id)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM favorite_folders WHERE is_global = 0 AND user_id = ?1 \
                 ORDER BY sort_order, created_at",
                FOLDER_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_folder)?;
            collect(rows)
        })
    }

    fn list_global_folders(&self) -> Result<Vec<FavoriteFolder>, GatewayError> {
        self.require_user()?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM favorite_folders WHERE is_global = 1 ORDER BY sort_order, created_at",
                FOLDER_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_folder)?;
            collect(rows)
        })
    }

    fn insert_folder(&self, folder: &NewFolder, is_global: bool) -> Result<FavoriteFolder, GatewayError> {
        let name = validate_folder_name(&folder.name)?;
        let color = folder
            .color
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string());
        let id = Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        self.with_conn(|conn| {
            let user = if is_global {
                self.require_role(conn, UserRole::is_super_admin, "creating global folders")?
            } else {
                self.require_user()?
            };
            let owner = if is_global { None } else { Some(user.id.clone()) };
            let sort_order: i32 = conn.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM favorite_folders \
                 WHERE is_global = ?1 AND (user_id IS ?2)",
                params![is_global, owner],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO favorite_folders (id, name, description, color, is_global, created_by, user_id, sort_order, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![id, name, folder.description, color, is_global, user.id, owner, sort_order, now],
            )?;
            Self::fetch_folder(conn, &id)
        })
    }

    fn update_folder(&self, id: &str, update: &FolderUpdate) -> Result<FavoriteFolder, GatewayError> {
        let name = update.name.as_deref().map(validate_folder_name).transpose()?;
        self.with_conn(|conn| {
            let mut folder = self.require_folder_write(conn, id)?;
            if let Some(name) = name {
                folder.name = name;
            }
            if let Some(description) = &update.description {
                folder.description = description.clone();
            }
            if let Some(color) = update.color.as_ref().filter(|c| !c.trim().is_empty()) {
                folder.color = color.clone();
            }
            conn.execute(
                "UPDATE favorite_folders SET name = ?1, description = ?2, color = ?3 WHERE id = ?4",
                params![folder.name, folder.description, folder.color, id],
            )?;
            Ok(folder)
        })
    }

    fn delete_folder(&self, id: &str) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            self.require_folder_write(conn, id)?;
            let tx = conn.unchecked_transaction()?;
            // Links must be detached before the row goes, or they would dangle.
            let detached = tx.execute(
                "UPDATE user_favorites SET folder_id = NULL WHERE folder_id = ?1",
                params![id],
            )?;
            tx.execute("DELETE FROM favorite_folders WHERE id = ?1", params![id])?;
            tx.commit()?;
            debug!(folder_id = %id, detached, "folder deleted");
            Ok(())
        })
    }

    fn reorder_folders(&self, ordered_ids: &[String]) -> Result<(), GatewayError> {
        let user = self.require_user()?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for (position, id) in ordered_ids.iter().enumerate() {
                let affected = tx.execute(
                    "UPDATE favorite_folders SET sort_order = ?1 \
                     WHERE id = ?2 AND is_global = 0 AND user_id = ?3",
                    params![position as i32, id, user.id],
                )?;
                if affected == 0 {
                    return Err(GatewayError::Forbidden(format!(
                        "folder {} is not a personal folder of the caller",
                        id
                    )));
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    // ─── Telemetry ───

    fn insert_session(&self, session: &UserSession) -> Result<(), GatewayError> {
        self.require_self(&session.user_id)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_sessions (session_id, user_id, start_time, end_time, user_agent, referrer) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.session_id,
                    session.user_id,
                    to_millis(session.start_time),
                    session.end_time.map(to_millis),
                    session.user_agent,
                    session.referrer
                ],
            )?;
            Ok(())
        })
    }

    fn close_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<(), GatewayError> {
        let user = self.require_user()?;
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE user_sessions SET end_time = ?1 WHERE session_id = ?2 AND user_id = ?3",
                params![to_millis(end_time), session_id, user.id],
            )?;
            if affected == 0 {
                return Err(GatewayError::NotFound(format!("session {}", session_id)));
            }
            Ok(())
        })
    }

    fn list_sessions(&self, user_id: Option<&str>) -> Result<Vec<UserSession>, GatewayError> {
        let user = self.require_user()?;
        self.with_conn(|conn| {
            let is_admin = Self::role_of(conn, &user.id)?.can_manage_demos();
            // Non-admins only ever see their own sessions.
            let scope = match (user_id, is_admin) {
                (Some(id), false) if id != user.id => {
                    return Err(GatewayError::Forbidden("cannot read other users' sessions".to_string()))
                }
                (Some(id), _) => Some(id.to_string()),
                (None, true) => None,
                (None, false) => Some(user.id.clone()),
            };
            let mut stmt = conn.prepare(
                "SELECT session_id, user_id, start_time, end_time, user_agent, referrer \
                 FROM user_sessions WHERE (?1 IS NULL OR user_id = ?1) ORDER BY start_time",
            )?;
            let rows = stmt.query_map(params![scope], row_to_session)?;
            collect(rows)
        })
    }

    fn insert_activity(&self, activity: &NewActivity) -> Result<(), GatewayError> {
        let user = self.require_user()?;
        let data = serde_json::to_string(&activity.activity_data)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activity_logs (id, session_id, user_id, activity_type, resource_type, resource_id, activity_data, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    activity.session_id,
                    user.id,
                    activity.activity_type.as_str(),
                    activity.resource_type,
                    activity.resource_id,
                    data,
                    to_millis(activity.timestamp)
                ],
            )?;
            Ok(())
        })
    }

    fn list_activity(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ActivityLogEntry>, GatewayError> {
        let user = self.require_user()?;
        self.with_conn(|conn| {
            let is_admin = Self::role_of(conn, &user.id)?.can_manage_demos();
            let scope = if is_admin { None } else { Some(user.id.clone()) };
            let mut stmt = conn.prepare(
                "SELECT id, session_id, user_id, activity_type, resource_type, resource_id, activity_data, timestamp \
                 FROM activity_logs \
                 WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR timestamp >= ?2) \
                 ORDER BY timestamp",
            )?;
            let rows = stmt.query_map(params![scope, since.map(to_millis)], row_to_activity)?;
            collect(rows)
        })
    }

    // ─── Object storage ───

    fn upload_screenshot(&self, key: &str, bytes: &[u8]) -> Result<String, GatewayError> {
        self.with_conn(|conn| {
            self.require_role(conn, UserRole::can_manage_demos, "uploading screenshots")?;
            Ok(())
        })?;
        self.backend.storage.upload(key, bytes)
    }

    fn delete_screenshot(&self, key: &str) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            self.require_role(conn, UserRole::can_manage_demos, "deleting screenshots")?;
            Ok(())
        })?;
        self.backend.storage.delete(key)
    }
}
