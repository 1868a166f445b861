//! The one-shot completion channel backing the script callback.
//!
//! Each entry-point call wires a fresh producer/consumer pair. The script's
//! completion callback feeds the producer; the host reads the consumer only
//! after the script has returned and all timers have drained. Consuming the
//! producer by value makes double resolution unrepresentable here; the
//! invocation slot enforces at-most-once handout.

use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};

use scriptbridge_common::error::BridgeError;

type Outcome = Result<Vec<u8>, String>;

/// Write side, handed (indirectly) to the script's completion callback.
pub struct CompletionProducer {
    tx: SyncSender<Outcome>,
}

impl CompletionProducer {
    /// Resolves the call with a response payload.
    pub fn resolve(self, payload: Vec<u8>) {
        // Buffered capacity is one and each producer sends at most once,
        // so this never blocks. A consumer dropped early is not an error.
        let _ = self.tx.send(Ok(payload));
    }

    /// Rejects the call with a business-logic error message.
    pub fn reject(self, message: String) {
        let _ = self.tx.send(Err(message));
    }
}

impl std::fmt::Debug for CompletionProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProducer").finish_non_exhaustive()
    }
}

/// Read side, held by the host for the duration of one call.
pub struct CompletionConsumer {
    rx: Receiver<Outcome>,
}

impl CompletionConsumer {
    /// Reads the buffered outcome.
    ///
    /// Must be called after the producer has been dropped or consumed. A
    /// channel that closed without an outcome means the transaction
    /// function returned without ever invoking its callback.
    pub fn take(self) -> Result<Vec<u8>, BridgeError> {
        match self.rx.try_recv() {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(message)) => Err(BridgeError::script(message)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                Err(BridgeError::CallbackNotInvoked)
            }
        }
    }
}

impl std::fmt::Debug for CompletionConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConsumer").finish_non_exhaustive()
    }
}

/// Creates the producer/consumer pair for one entry-point call.
pub fn completion_channel() -> (CompletionProducer, CompletionConsumer) {
    let (tx, rx) = sync_channel(1);
    (CompletionProducer { tx }, CompletionConsumer { rx })
}
