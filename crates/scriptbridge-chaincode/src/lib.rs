//! Chaincode facade for the script bridge.
//!
//! This crate is the deployable surface: the host ledger hands each
//! Init/Invoke/Query call to a [`ScriptChaincode`], which runs the
//! business-logic bundle inside a pooled script engine and returns the
//! transaction's payload or error. Everything below it (engine embedding,
//! host services, ledger abstraction) is re-exported from the inner crates
//! where a bootstrap binary needs it.

pub mod chaincode;

pub use chaincode::ScriptChaincode;
pub use scriptbridge_common::config::BridgeConfig;
pub use scriptbridge_common::config_file::ConfigFile;
pub use scriptbridge_common::error::BridgeError;
pub use scriptbridge_common::ledger::LedgerStub;
pub use scriptbridge_common::telemetry;
