use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the backend endpoint.
pub const ENV_BACKEND_URL: &str = "CONCEPT_TRACKER_URL";
/// Environment variable holding the public API key.
pub const ENV_API_KEY: &str = "CONCEPT_TRACKER_API_KEY";
pub const ENV_STORAGE_DIR: &str = "CONCEPT_TRACKER_STORAGE_DIR";
pub const ENV_TIMEOUT_SECS: &str = "CONCEPT_TRACKER_TIMEOUT_SECS";
pub const ENV_CONFIG_FILE: &str = "CONCEPT_TRACKER_CONFIG";

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const MIN_TIMEOUT_SECS: u64 = 3;
pub const MAX_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;

/// Where the relational backend lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendUrl {
    /// `sqlite::memory:`, discarded when the process exits.
    Memory,
    /// `sqlite://<path>`
    File(PathBuf),
}

impl BackendUrl {
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url == "sqlite::memory:" {
            return Some(BackendUrl::Memory);
        }
        url.strip_prefix("sqlite://")
            .filter(|path| !path.is_empty())
            .map(|path| BackendUrl::File(PathBuf::from(path)))
    }
}

/// Validated application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub backend_url: BackendUrl,
    pub api_key: String,
    /// Root of the screenshot object store.
    pub storage_dir: PathBuf,
    /// Timeout applied to startup verification, already clamped.
    pub timeout_secs: u64,
    pub password_iterations: u32,
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// In-memory configuration, handy for tests and local runs.
    pub fn in_memory(api_key: &str, storage_dir: PathBuf) -> Self {
        Self {
            backend_url: BackendUrl::Memory,
            api_key: api_key.to_string(),
            storage_dir,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
        }
    }
}

/// Configuration as read from disk, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RawConfig {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub storage_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub password_iterations: Option<u32>,
}
