use thiserror::Error;

// === ConfigError ===

/// Errors raised while loading or validating the application configuration.
///
/// All of these are fatal: the application refuses to start until the
/// deployment configuration is fixed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration variable is absent or blank.
    #[error("Missing required configuration variable: {0}")]
    Missing(String),
    /// A configuration value is present but malformed.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    /// The configuration file could not be read.
    #[error("Configuration I/O error: {0}")]
    Io(String),
    /// The configuration file is not valid JSON.
    #[error("Configuration parse error: {0}")]
    Parse(String),
}

// === CryptoError ===

/// Errors related to password hashing and token generation.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Failed to derive a password hash.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    /// Failed to generate random bytes.
    #[error("Random generation failed: {0}")]
    RandomGeneration(String),
}

// === GatewayError ===

/// Errors returned by the backend gateway.
///
/// Every rejection caused by a missing capability is reported as
/// [`GatewayError::Forbidden`], regardless of which role check failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The caller lacks the capability required for this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The caller is not signed in, or the credentials are wrong.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The write conflicts with an existing row.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The request payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The relational store failed.
    #[error("Database error: {0}")]
    Database(String),
    /// The object store failed.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Password hashing or token generation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl GatewayError {
    /// Returns true when the backend rejected the call for lack of capability.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, GatewayError::Forbidden(_))
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => {
                GatewayError::NotFound("query returned no rows".to_string())
            }
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                GatewayError::Conflict(msg.unwrap_or_else(|| code.to_string()))
            }
            other => GatewayError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Database(format!("malformed JSON column: {}", err))
    }
}

// === CatalogError ===

/// Errors related to demo catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Demo with the given ID is not in the catalog.
    #[error("Demo not found: {0}")]
    NotFound(String),
    /// The demo payload is invalid.
    #[error("Invalid demo: {0}")]
    Validation(String),
    /// The backend rejected or failed the call.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CatalogError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, CatalogError::Gateway(e) if e.is_forbidden())
    }
}

// === FavoritesError ===

/// Errors related to favorites and folder operations.
#[derive(Debug, Error)]
pub enum FavoritesError {
    /// The demo is not among the user's favorites.
    #[error("Demo is not favorited: {0}")]
    NotFavorited(String),
    /// The target folder was not found.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
    /// The folder payload is invalid.
    #[error("Invalid folder: {0}")]
    Validation(String),
    /// The backend rejected or failed the call.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl FavoritesError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, FavoritesError::Gateway(e) if e.is_forbidden())
    }
}

// === TrackerError ===

/// Errors related to session and activity tracking.
///
/// These never reach the user: the tracker logs and discards them.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No session has been started.
    #[error("No active session")]
    NoActiveSession,
    /// The backend rejected or failed the write.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// === ConnectivityError ===

/// Errors raised by startup verification of the backend.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The backend did not answer within the allotted time.
    #[error("Backend verification timed out after {0}s")]
    Timeout(u64),
    /// The backend answered with an error.
    #[error("Backend verification failed: {0}")]
    Backend(#[from] GatewayError),
    /// The verification task panicked or was cancelled.
    #[error("Backend verification task failed: {0}")]
    Task(String),
}
