//! Storage manager configuration
//!
//! Read from TOML. Every field is optional; missing fields take their
//! defaults.
//!
//! ```toml
//! log_profile = "production"
//! warn_on_missing_anchor = false
//! scrub_on_register = true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};
use crate::logging_facility::Profile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Logging profile a host should initialize with
    pub log_profile: Profile,
    /// Emit a warning when an anchor names an object that is not present
    pub warn_on_missing_anchor: bool,
    /// Recompute affected edit logs when a filter is registered
    pub scrub_on_register: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_profile: Profile::Development,
            warn_on_missing_anchor: true,
            scrub_on_register: true,
        }
    }
}

impl StorageConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the text is not valid TOML or a
    /// field has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file, falling back to defaults if it is absent
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file exists but cannot be read, or
    /// `StorageError::Config` if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                tracing::debug!(path = %path.display(), "loaded storage config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no storage config found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(StorageError::from(e)),
        }
    }
}
