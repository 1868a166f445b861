//! In-memory ledger stub.
//!
//! [`MemoryLedgerStub`] backs the test suites across the workspace: a
//! sorted in-memory key space (so prefix-range scans behave like the real
//! store), captured events, an injectable creator blob, and a fresh
//! transaction ID per instance. Native queries are deliberately
//! unsupported, mirroring platforms without that capability.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{LedgerStub, StateEntry, create_composite_key};

/// An in-memory [`LedgerStub`] for tests and local experiments.
#[derive(Debug)]
pub struct MemoryLedgerStub {
    state: Mutex<BTreeMap<String, Vec<u8>>>,
    events: Mutex<Vec<(String, Vec<u8>)>>,
    creator: Vec<u8>,
    function: String,
    parameters: Vec<String>,
    transaction_id: String,
}

impl MemoryLedgerStub {
    /// Create an empty stub with no invocation and no creator.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BTreeMap::new()),
            events: Mutex::new(Vec::new()),
            creator: Vec::new(),
            function: String::new(),
            parameters: Vec::new(),
            transaction_id: Uuid::new_v4().to_string(),
        }
    }

    /// Set the function name and arguments this stub reports.
    pub fn with_invocation(
        mut self,
        function: impl Into<String>,
        parameters: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.function = function.into();
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Set the creator blob this stub reports.
    pub fn with_creator(mut self, creator: impl Into<Vec<u8>>) -> Self {
        self.creator = creator.into();
        self
    }

    /// Pre-populate a raw state entry.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state.lock().insert(key.into(), value.into());
    }

    /// All keys currently stored, in scan order.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().keys().cloned().collect()
    }

    /// All events recorded so far, in emission order.
    pub fn events(&self) -> Vec<(String, Vec<u8>)> {
        self.events.lock().clone()
    }
}

impl Default for MemoryLedgerStub {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStub for MemoryLedgerStub {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state.lock().get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.state.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<(), LedgerError> {
        self.state.lock().remove(key);
        Ok(())
    }

    fn get_state_by_partial_composite_key(
        &self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<StateEntry>, LedgerError> {
        let prefix = create_composite_key(object_type, attributes)?;
        let state = self.state.lock();
        Ok(state
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| StateEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn execute_query(&self, _query: &str) -> Result<Vec<Vec<u8>>, LedgerError> {
        Err(LedgerError::QueryNotSupported)
    }

    fn creator(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(self.creator.clone())
    }

    fn function_and_parameters(&self) -> (String, Vec<String>) {
        (self.function.clone(), self.parameters.clone())
    }

    fn transaction_id(&self) -> String {
        self.transaction_id.clone()
    }

    fn set_event(&self, name: &str, payload: &[u8]) -> Result<(), LedgerError> {
        self.events
            .lock()
            .push((name.to_string(), payload.to_vec()));
        Ok(())
    }
}
