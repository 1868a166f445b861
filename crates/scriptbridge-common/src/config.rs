//! Configuration structures for the script bridge.
//!
//! This module defines configuration options for the bridge components:
//! - [`BridgeConfig`]: Top-level configuration containing all settings
//! - [`PoolConfig`]: Engine pool sizing
//! - [`HttpConfig`]: Outbound HTTP client settings
//! - [`LoggingConfig`]: Default log verbosity

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
///
/// This structure contains all configuration options for the script bridge.
/// It can be loaded from a TOML file or constructed programmatically.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Engine pool configuration.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Outbound HTTP client configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of idle engine instances the pool retains.
    ///
    /// Checkout never blocks on this limit; an empty pool fabricates a new
    /// instance on demand, and instances returned while the pool is full
    /// are discarded.
    #[serde(default = "defaults::pool_size")]
    pub size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::pool_size(),
        }
    }
}

/// Outbound HTTP client configuration.
///
/// These settings apply to the shared client used by the HTTP service
/// binding; the client is built once per chaincode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Total request timeout in seconds.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    #[serde(default = "defaults::connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout_secs(),
            connect_timeout_secs: defaults::connect_timeout_secs(),
        }
    }
}

impl HttpConfig {
    /// Get the request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level when neither ledger state nor the environment
    /// override it.
    ///
    /// One of `trace`, `debug`, `info`, `warn`, `error` (case-insensitive).
    #[serde(default = "defaults::default_level")]
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: defaults::default_level(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pool_size() -> usize {
        8
    }

    pub const fn timeout_secs() -> u64 {
        30
    }

    pub const fn connect_timeout_secs() -> u64 {
        10
    }

    pub fn default_level() -> String {
        "info".to_string()
    }
}
