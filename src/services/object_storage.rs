//! Filesystem-backed object store for demo screenshots.
//!
//! Objects live under `<root>/screenshots/<key>` and are addressed publicly as
//! `storage://screenshots/<key>`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::errors::GatewayError;

pub const SCREENSHOT_BUCKET: &str = "screenshots";
const PUBLIC_URL_PREFIX: &str = "storage://screenshots/";

/// Largest accepted screenshot, in bytes.
pub const MAX_SCREENSHOT_BYTES: usize = 5 * 1024 * 1024;

pub struct ObjectStorage {
    root: PathBuf,
}

impl ObjectStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Keys are flat names: no separators, no parent references, no hidden files.
    fn validate_key(key: &str) -> Result<(), GatewayError> {
        let valid = !key.is_empty()
            && key.len() <= 128
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(GatewayError::Validation(format!("invalid object key: {}", key)))
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(SCREENSHOT_BUCKET).join(key)
    }

    /// Stores `bytes` under `key`, replacing any previous object. Returns the public URL.
    pub fn upload(&self, key: &str, bytes: &[u8]) -> Result<String, GatewayError> {
        Self::validate_key(key)?;
        if bytes.is_empty() {
            return Err(GatewayError::Validation("empty upload".to_string()));
        }
        if bytes.len() > MAX_SCREENSHOT_BYTES {
            return Err(GatewayError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_SCREENSHOT_BYTES
            )));
        }

        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GatewayError::Storage(format!("Failed to create bucket: {}", e)))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| GatewayError::Storage(format!("Failed to write object: {}", e)))?;

        Ok(Self::public_url(key))
    }

    /// Removes the object. Deleting a missing object is not an error.
    pub fn delete(&self, key: &str) -> Result<(), GatewayError> {
        Self::validate_key(key)?;
        match fs::remove_file(self.object_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Storage(format!("Failed to delete object: {}", e))),
        }
    }

    pub fn public_url(key: &str) -> String {
        format!("{}{}", PUBLIC_URL_PREFIX, key)
    }

    /// Recovers the object key from a URL produced by [`ObjectStorage::public_url`].
    pub fn key_from_url(url: &str) -> Option<&str> {
        url.strip_prefix(PUBLIC_URL_PREFIX).filter(|k| !k.is_empty())
    }
}
