//! Tracing setup with runtime log-level reload.
//!
//! The bridge persists its log verbosity in ledger state so it survives
//! container restarts; at process start the environment variable
//! [`LOG_LEVEL_ENV_VAR`] can override the configured default until a
//! persisted value is observed. [`init`] installs the subscriber and
//! returns a [`LogLevelHandle`] through which the logging service applies
//! level changes to the live filter.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::error::BridgeError;

/// Environment variable consulted for the initial log level.
pub const LOG_LEVEL_ENV_VAR: &str = "CORE_CHAINCODE_LOGGING_LEVEL";

/// A handle for changing the live log level at runtime.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Apply `level` to the live subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] if `level` is not a known
    /// level name or the subscriber is no longer reachable.
    pub fn set(&self, level: &str) -> Result<(), BridgeError> {
        let normalized = normalize_level(level)
            .ok_or_else(|| BridgeError::invalid_config(format!("unknown log level '{level}'")))?;
        self.handle
            .reload(EnvFilter::new(normalized))
            .map_err(|e| BridgeError::invalid_config(format!("log level reload failed: {e}")))
    }
}

impl std::fmt::Debug for LogLevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevelHandle").finish_non_exhaustive()
    }
}

/// Install the global subscriber and return the reload handle.
///
/// The initial level is the environment override if present, otherwise
/// `default_level`, otherwise `info`. Repeated calls keep the first
/// installed subscriber; the returned handle then has no effect, which
/// keeps test processes well-behaved.
pub fn init(default_level: &str) -> LogLevelHandle {
    let level = initial_level(default_level);
    let (filter, handle) = reload::Layer::new(EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    tracing::debug!(level, "Telemetry installed");
    LogLevelHandle { handle }
}

/// Resolve the level to install before any persisted value is available:
/// environment override first, then the configured default.
pub fn initial_level(default_level: &str) -> &'static str {
    std::env::var(LOG_LEVEL_ENV_VAR)
        .ok()
        .as_deref()
        .and_then(normalize_level)
        .or_else(|| normalize_level(default_level))
        .unwrap_or("info")
}

/// Map a level name to its canonical lowercase form.
///
/// Accepts the bridge's own names plus the host ledger's legacy names
/// (`WARNING`, `NOTICE`, `CRITICAL`), case-insensitively. Returns `None`
/// for anything else.
pub fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" | "notice" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" => Some("error"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("DEBUG"), Some("debug"));
        assert_eq!(normalize_level("info"), Some("info"));
        assert_eq!(normalize_level(" Warn "), Some("warn"));
        assert_eq!(normalize_level("WARNING"), Some("warn"));
        assert_eq!(normalize_level("NOTICE"), Some("info"));
        assert_eq!(normalize_level("CRITICAL"), Some("error"));
        assert_eq!(normalize_level("verbose"), None);
        assert_eq!(normalize_level(""), None);
    }

    #[test]
    fn test_initial_level_falls_back_to_default() {
        // The override variable is not set in the test environment.
        if std::env::var(LOG_LEVEL_ENV_VAR).is_err() {
            assert_eq!(initial_level("debug"), "debug");
            assert_eq!(initial_level("bogus"), "info");
        }
    }

    #[test]
    fn test_set_unknown_level_is_rejected() {
        let handle = init("info");
        let err = handle.set("verbose").unwrap_err();
        assert!(err.to_string().contains("unknown log level"));
        handle.set("DEBUG").unwrap();
    }
}
