//! Common types, errors, and ledger abstractions for scriptbridge.
//!
//! This crate provides shared functionality used across the scriptbridge
//! workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures and TOML file loading
//! - The [`LedgerStub`] trait and composite-key helpers
//! - An in-memory stub for tests
//! - The injected scan coordinator and tracing setup

pub mod config;
pub mod config_file;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod telemetry;

pub use config::{BridgeConfig, HttpConfig, LoggingConfig, PoolConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use coordinator::ScanCoordinator;
pub use error::{BridgeError, LedgerError, ServiceError};
pub use ledger::{
    COLLECTION_METADATA_TAG, LOG_LEVEL_STATE_KEY, LedgerStub, StateEntry, create_composite_key,
    split_composite_key,
};
pub use memory::MemoryLedgerStub;
pub use telemetry::LogLevelHandle;
