//! Business-event buffering.
//!
//! Events emitted during a transaction are not written to the ledger as
//! they happen; they accumulate here and the chaincode facade flushes the
//! whole batch as one named ledger event if, and only if, the transaction
//! commits.

use parking_lot::Mutex;
use scriptbridge_common::error::ServiceError;
use scriptbridge_core::Args;
use tracing::debug;

use crate::registry::{ServiceObject, ServiceReply};

/// Name of the ledger event channel carrying the batch.
pub const EVENT_CHANNEL: &str = "scriptbridge";

#[derive(Default)]
pub struct EventService {
    buffer: Mutex<Vec<serde_json::Value>>,
}

impl EventService {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event_data: &serde_json::Value) -> Result<ServiceReply, ServiceError> {
        debug!("Buffering emitted event");
        self.buffer.lock().push(event_data.clone());
        Ok(ServiceReply::Unit)
    }

    /// Drains the buffered batch; empty when nothing was emitted.
    pub fn take_batch(&self) -> Vec<serde_json::Value> {
        std::mem::take(&mut *self.buffer.lock())
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl ServiceObject for EventService {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "emit" => self.emit(args.json(0, "event_data")?),
            other => Err(ServiceError::violation(format!(
                "unknown event service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for EventService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventService")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
