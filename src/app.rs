//! App Core for Concept Tracker.
//!
//! Central struct wiring configuration, the backend gateway, the stores and the
//! tracker, and owning the sign-in/sign-out and startup/shutdown lifecycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::managers::demo_catalog::{DemoCatalog, DemoCatalogTrait};
use crate::managers::favorites_manager::{FavoritesManager, FavoritesManagerTrait};
use crate::managers::session_tracker::{SessionTracker, SessionTrackerTrait};
use crate::services::analytics_engine::AnalyticsEngine;
use crate::services::backend_gateway::BackendGateway;
use crate::services::connectivity::{verify_backend, ConnectivityReport};
use crate::services::sqlite_gateway::SqliteGateway;
use crate::types::analytics::DashboardSnapshot;
use crate::types::config::AppConfig;
use crate::types::errors::{CatalogError, ConnectivityError, FavoritesError, GatewayError};
use crate::types::profile::AuthUser;

const DEFAULT_USER_AGENT: &str = concat!("concept-tracker/", env!("CARGO_PKG_VERSION"));

/// Central application struct holding the gateway, stores and aggregators.
///
/// The favorites manager only exists while a user is signed in.
pub struct App {
    pub config: AppConfig,
    pub gateway: Arc<dyn BackendGateway>,
    pub catalog: DemoCatalog,
    pub favorites: Option<FavoritesManager>,
    pub tracker: SessionTracker,
    pub analytics: AnalyticsEngine,
    user_agent: String,
}

impl App {
    /// Opens the configured backend and builds every store on top of it.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let gateway = SqliteGateway::from_config(&config)
            .map_err(|e| format!("Backend init failed: {}", e))?;
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    pub fn with_gateway(config: AppConfig, gateway: Arc<dyn BackendGateway>) -> Self {
        Self {
            catalog: DemoCatalog::new(gateway.clone()),
            tracker: SessionTracker::new(gateway.clone()),
            analytics: AnalyticsEngine::new(gateway.clone()),
            favorites: None,
            gateway,
            config,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn set_user_agent(&mut self, user_agent: &str) {
        self.user_agent = user_agent.to_string();
    }

    /// Startup sequence: verify the backend within the configured timeout, then
    /// load the catalog. Verification failure is fatal; a catalog load failure is not.
    pub async fn startup(&mut self) -> Result<ConnectivityReport, ConnectivityError> {
        let report = verify_backend(self.gateway.clone(), self.config.timeout()).await?;
        if let Err(e) = self.catalog.load() {
            warn!(error = %e, "initial catalog load failed");
        }
        info!(demos = self.catalog.demos().len(), "startup complete");
        Ok(report)
    }

    pub fn sign_up(&mut self, email: &str, password: &str, display_name: &str) -> Result<AuthUser, GatewayError> {
        self.leave_current_user();
        let user = self.gateway.sign_up(email, password, display_name)?;
        self.on_signed_in(&user);
        Ok(user)
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        self.leave_current_user();
        let user = self.gateway.sign_in(email, password)?;
        self.on_signed_in(&user);
        Ok(user)
    }

    /// Opens a session and loads favorites for the new user. Both are best-effort.
    fn on_signed_in(&mut self, user: &AuthUser) {
        self.tracker.start_session(&user.id, &self.user_agent, None);

        let mut favorites = FavoritesManager::new(self.gateway.clone(), &user.id);
        if let Err(e) = favorites.load_favorites_and_folders(&user.id) {
            warn!(user_id = %user.id, error = %e, "favorites load failed after sign-in");
        }
        self.favorites = Some(favorites);
    }

    /// Closes the current user's session while the backend still acts as them.
    fn leave_current_user(&mut self) {
        self.tracker.end_session();
        self.favorites = None;
    }

    pub fn sign_out(&mut self) -> Result<(), GatewayError> {
        self.leave_current_user();
        self.gateway.sign_out()
    }

    pub fn favorites_mut(&mut self) -> Result<&mut FavoritesManager, FavoritesError> {
        self.favorites
            .as_mut()
            .ok_or_else(|| GatewayError::Unauthorized("sign in required".to_string()).into())
    }

    /// Counts a view of the demo and logs it.
    pub fn view_demo(&mut self, demo_id: &str) -> Result<i64, CatalogError> {
        let views = self.catalog.increment_views(demo_id)?;
        let title = self
            .catalog
            .get(demo_id)
            .map(|d| d.title.clone())
            .unwrap_or_default();
        self.tracker.track_view_demo(demo_id, &title);
        Ok(views)
    }

    /// Toggles a favorite and logs it. The log write never affects the result.
    pub fn toggle_favorite(&mut self, demo_id: &str) -> Result<bool, FavoritesError> {
        let favorited = self.favorites_mut()?.toggle_favorite(demo_id)?;
        self.tracker.track_favorite(demo_id, favorited);
        Ok(favorited)
    }

    pub fn dashboard(&self) -> DashboardSnapshot {
        let favorites = self.favorites.as_ref().map(|f| f.favorites()).unwrap_or(&[]);
        self.analytics.snapshot(self.catalog.demos(), favorites, Utc::now())
    }

    /// Shutdown sequence: close the open session.
    pub fn shutdown(&mut self) {
        self.tracker.end_session();
        info!("shutdown complete");
    }
}
