//! Error types for the script bridge.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`BridgeError`]: Top-level errors returned by the chaincode entry points
//! - [`ServiceError`]: Two-category errors from service dispatch
//! - [`LedgerError`]: Errors from the host ledger stub

use thiserror::Error;

/// Top-level bridge errors.
///
/// These errors represent the failure modes a chaincode entry point can
/// report back to the host ledger: contract violations at the native
/// boundary, business-logic failures raised inside the script engine,
/// protocol failures, and ledger storage failures.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The calling convention at the native boundary was violated.
    ///
    /// This is a defect in the business-logic bundle, not a runtime
    /// condition to recover from. The engine instance that observed it is
    /// poisoned and will not be returned to the pool.
    #[error("Contract violation: {message}")]
    ContractViolation {
        /// Description of the violated convention.
        message: String,
    },

    /// The business logic threw an error, or its completion callback
    /// delivered one.
    #[error("Script error: {message}")]
    Script {
        /// String representation of the script-side error value.
        message: String,
    },

    /// The completion callback was never invoked.
    ///
    /// The message text is fixed; it is the only signal the host ledger
    /// receives for this condition.
    #[error("Failed to receive callback from transaction function")]
    CallbackNotInvoked,

    /// A ledger operation failed outside the callback convention.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The business-logic bundle failed to compile.
    #[error("Bundle compilation failed: {reason}")]
    InvalidBundle {
        /// Description of the compilation failure.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl BridgeError {
    /// Create a new `ContractViolation` error.
    pub fn contract_violation(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a new `Script` error.
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a new `InvalidBundle` error.
    pub fn invalid_bundle(reason: impl Into<String>) -> Self {
        Self::InvalidBundle {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a calling-convention violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }

    /// Returns `true` if this error originated in the business logic.
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }

    /// Returns `true` if the completion protocol was never honoured.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::CallbackNotInvoked)
    }
}

/// Errors produced while dispatching a service request.
///
/// Service operations report failures through exactly two channels: a
/// `Violation` aborts the call and poisons the engine instance, while a
/// `Failed` is delivered to the business logic through its error-first
/// callback and is recoverable from the script's point of view.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A positional argument had the wrong type, was missing, or the
    /// completion protocol was abused.
    #[error("{message}")]
    Violation {
        /// Description of the violated convention.
        message: String,
    },

    /// The operation could not be performed; deliver to the callback.
    ///
    /// The message is the full callback error text, so domain-conflict
    /// wording is preserved verbatim.
    #[error("{message}")]
    Failed {
        /// The callback error text.
        message: String,
    },
}

impl ServiceError {
    /// Create a new `Violation` error.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Violation {
            message: message.into(),
        }
    }

    /// Create a new `Failed` error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error must abort the call.
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation { .. })
    }
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        Self::Failed {
            message: err.to_string(),
        }
    }
}

/// Errors from the host ledger stub.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The backing store reported a failure.
    #[error("Ledger backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A composite key component was malformed.
    #[error("Invalid composite key: {reason}")]
    InvalidCompositeKey {
        /// Description of why the key was rejected.
        reason: String,
    },

    /// The ledger platform has no native query capability.
    #[error("Native queries are not supported by this ledger")]
    QueryNotSupported,
}

impl LedgerError {
    /// Create a new `Backend` error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a new `InvalidCompositeKey` error.
    pub fn invalid_composite_key(reason: impl Into<String>) -> Self {
        Self::InvalidCompositeKey {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the platform lacks native query support.
    pub fn is_query_not_supported(&self) -> bool {
        matches!(self, Self::QueryNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::contract_violation("id not specified or is not a string");
        assert_eq!(
            err.to_string(),
            "Contract violation: id not specified or is not a string"
        );

        let err = BridgeError::CallbackNotInvoked;
        assert_eq!(
            err.to_string(),
            "Failed to receive callback from transaction function"
        );
    }

    #[test]
    fn test_service_error_preserves_message() {
        let err = ServiceError::failed("Collection with ID assets does not exist");
        assert_eq!(err.to_string(), "Collection with ID assets does not exist");
    }

    #[test]
    fn test_error_from_ledger() {
        let ledger_err = LedgerError::backend("disk unavailable");
        let bridge_err: BridgeError = ledger_err.into();

        assert!(matches!(bridge_err, BridgeError::Ledger(_)));
        assert_eq!(
            bridge_err.to_string(),
            "Ledger error: Ledger backend error: disk unavailable"
        );
    }

    #[test]
    fn test_service_error_from_ledger() {
        let err: ServiceError = LedgerError::QueryNotSupported.into();
        assert!(!err.is_violation());
        assert_eq!(
            err.to_string(),
            "Native queries are not supported by this ledger"
        );
    }

    #[test]
    fn test_is_contract_violation() {
        assert!(BridgeError::contract_violation("x").is_contract_violation());
        assert!(!BridgeError::script("x").is_contract_violation());
    }

    #[test]
    fn test_is_protocol() {
        assert!(BridgeError::CallbackNotInvoked.is_protocol());
        assert!(!BridgeError::script("x").is_protocol());
    }
}
