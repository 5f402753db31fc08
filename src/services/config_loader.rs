// Concept Tracker Config Loader
// Reads an optional JSON config file, layers environment variables on top, and
// validates the result. A missing endpoint or API key stops startup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::config::{
    AppConfig, BackendUrl, RawConfig, DEFAULT_PASSWORD_ITERATIONS, DEFAULT_TIMEOUT_SECS, ENV_API_KEY,
    ENV_BACKEND_URL, ENV_CONFIG_FILE, ENV_STORAGE_DIR, ENV_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
    MIN_TIMEOUT_SECS,
};
use crate::types::errors::ConfigError;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Trait defining the configuration loading interface.
pub trait ConfigLoaderTrait {
    fn load(&self) -> Result<AppConfig, ConfigError>;
    fn config_path(&self) -> Option<&Path>;
}

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    lookup: EnvLookup,
}

impl ConfigLoader {
    /// Loader reading the process environment. The config file path comes from
    /// `CONCEPT_TRACKER_CONFIG` unless `path_override` is given.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path =
            path_override.or_else(|| std::env::var(ENV_CONFIG_FILE).ok().map(PathBuf::from));
        Self {
            config_path,
            lookup: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Loader with an injected environment, for tests and embedding.
    pub fn with_lookup<F>(config_path: Option<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            config_path,
            lookup: Box::new(lookup),
        }
    }

    /// Reads the config file. A missing file yields an empty configuration.
    fn read_file(&self) -> Result<RawConfig, ConfigError> {
        let Some(path) = self.config_path.as_deref() else {
            return Ok(RawConfig::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "config file absent, using environment only");
            return Ok(RawConfig::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config file: {}", e)))
    }

    fn env(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Environment variables win over file values.
    fn apply_env(&self, raw: &mut RawConfig) -> Result<(), ConfigError> {
        if let Some(url) = self.env(ENV_BACKEND_URL) {
            raw.backend_url = Some(url);
        }
        if let Some(key) = self.env(ENV_API_KEY) {
            raw.api_key = Some(key);
        }
        if let Some(dir) = self.env(ENV_STORAGE_DIR) {
            raw.storage_dir = Some(dir);
        }
        if let Some(secs) = self.env(ENV_TIMEOUT_SECS) {
            let parsed = secs.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))
            })?;
            raw.timeout_secs = Some(parsed);
        }
        Ok(())
    }

    /// Turns a raw configuration into a validated [`AppConfig`].
    pub fn validate(raw: RawConfig) -> Result<AppConfig, ConfigError> {
        let url = raw
            .backend_url
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing(ENV_BACKEND_URL.to_string()))?;
        let api_key = raw
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::Missing(ENV_API_KEY.to_string()))?;

        let backend_url = BackendUrl::parse(&url).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "{} must be sqlite://<path> or sqlite::memory:, got {}",
                ENV_BACKEND_URL, url
            ))
        })?;

        let storage_dir = match raw.storage_dir.filter(|d| !d.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => match &backend_url {
                BackendUrl::File(path) => path.with_extension("storage"),
                BackendUrl::Memory => std::env::temp_dir().join("concept-tracker-storage"),
            },
        };

        let timeout_secs = raw
            .timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        let password_iterations = raw.password_iterations.unwrap_or(DEFAULT_PASSWORD_ITERATIONS);
        if password_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "password_iterations must be positive".to_string(),
            ));
        }

        Ok(AppConfig {
            backend_url,
            api_key,
            storage_dir,
            timeout_secs,
            password_iterations,
        })
    }
}

impl ConfigLoaderTrait for ConfigLoader {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut raw = self.read_file()?;
        self.apply_env(&mut raw)?;
        Self::validate(raw)
    }

    fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
