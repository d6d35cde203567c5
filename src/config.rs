//! Client configuration: payload cap, default key version, local store dir.
//!
//! Resolution order: defaults, then an optional JSON file, then
//! `DEKWRAP_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BackupError;
use crate::keys::KeyVersion;

/// 256 KiB. Larger payloads are rejected before any crypto runs.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 256 * 1024;

pub const DEFAULT_KEY_VERSION: &str = "rsa-2024-10";

pub const DEFAULT_STORE_DIR: &str = "./dekwrap-data";

pub const ENV_MAX_INPUT_BYTES: &str = "DEKWRAP_MAX_INPUT_BYTES";
pub const ENV_KEY_VERSION: &str = "DEKWRAP_KEY_VERSION";
pub const ENV_STORE_DIR: &str = "DEKWRAP_STORE_DIR";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Largest plaintext `BackupClient::seal` accepts.
    pub max_input_bytes: usize,
    /// Version label used when the server does not name one.
    pub default_key_version: KeyVersion,
    /// Where `FileStore` keeps records.
    pub store_dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            default_key_version: KeyVersion::new(DEFAULT_KEY_VERSION),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

impl BackupConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BackupError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Storage(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| BackupError::Storage(format!("parse {}: {}", path.display(), e)))
    }

    /// Defaults overridden by whatever `DEKWRAP_*` variables are set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any lookup (the environment, a map in tests).
    /// Unparseable numbers are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_MAX_INPUT_BYTES) {
            match v.parse() {
                Ok(n) => self.max_input_bytes = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid {}", ENV_MAX_INPUT_BYTES),
            }
        }
        if let Some(v) = lookup(ENV_KEY_VERSION) {
            self.default_key_version = KeyVersion::new(v);
        }
        if let Some(v) = lookup(ENV_STORE_DIR) {
            self.store_dir = PathBuf::from(v);
        }
        self
    }
}
