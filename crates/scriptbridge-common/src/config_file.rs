//! Configuration file structures for the script bridge.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`BundleEntry`]: Location of the business-logic bundle

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BridgeConfig;

/// Top-level configuration file structure.
///
/// This structure represents a complete TOML configuration file that an
/// embedding process can load at startup.
///
/// # Example
///
/// ```toml
/// [bridge.pool]
/// size = 8
///
/// [bridge.http]
/// timeout_secs = 30
///
/// [bridge.logging]
/// default_level = "info"
///
/// [bundle]
/// path = "./network/logic.rhai"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Bridge configuration (pool + http + logging settings).
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Business-logic bundle to load at startup.
    #[serde(default)]
    pub bundle: Option<BundleEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Location of the business-logic bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleEntry {
    /// Path to the script bundle source file.
    pub path: String,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
