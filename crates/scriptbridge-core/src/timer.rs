//! Deferred script callbacks (`set_timeout` / `set_interval`).
//!
//! Transaction functions may defer work with timers, but a chaincode call
//! must not return while deferred work is pending. After the entry function
//! returns, the instance drains this registry on the calling thread: each
//! expired timer fires its script callback, repeating timers re-arm, and
//! the call completes only once the registry is empty.
//!
//! Arming is a detached sleeper thread per registration that posts the
//! timer id to a ready queue. Cancellation does not chase the sleeper; the
//! drain loop discards ids no longer present in the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rhai::{AST, Dynamic, Engine, FnPtr};
use scriptbridge_common::error::BridgeError;
use tracing::{debug, trace};

use crate::marshal::describe_eval_error;

pub type TimerId = i64;

/// How often the drain loop re-checks for an empty registry while no
/// timer has expired yet.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

struct TimerEntry {
    callback: FnPtr,
    args: Vec<Dynamic>,
    period: Duration,
    repeating: bool,
    cancelled: Arc<AtomicBool>,
}

/// Live timers for one engine instance.
pub struct TimerRegistry {
    entries: DashMap<TimerId, TimerEntry>,
    ready_tx: Mutex<Sender<TimerId>>,
    ready_rx: Mutex<Receiver<TimerId>>,
    next_id: AtomicI64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = channel();
        Self {
            entries: DashMap::new(),
            ready_tx: Mutex::new(ready_tx),
            ready_rx: Mutex::new(ready_rx),
            next_id: AtomicI64::new(1),
        }
    }

    /// Registers a callback to fire after `delay_ms` milliseconds.
    ///
    /// Non-positive delays are clamped to one millisecond. Ids are never
    /// reused within an instance, so a stale ready notification from a
    /// previous call can never fire a newer timer.
    pub fn register(
        &self,
        callback: FnPtr,
        delay_ms: i64,
        args: Vec<Dynamic>,
        repeating: bool,
    ) -> TimerId {
        let delay_ms = if delay_ms > 0 { delay_ms } else { 1 };
        let period = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        self.entries.insert(
            id,
            TimerEntry {
                callback,
                args,
                period,
                repeating,
                cancelled: Arc::clone(&cancelled),
            },
        );
        trace!(timer_id = id, delay_ms, repeating, "Timer registered");
        self.arm(id, period, cancelled);
        id
    }

    /// Cancels a timer. Unknown ids are ignored.
    pub fn cancel(&self, id: TimerId) {
        if let Some((_, entry)) = self.entries.remove(&id) {
            entry.cancelled.store(true, Ordering::Relaxed);
            trace!(timer_id = id, "Timer cancelled");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cancels and removes every live timer.
    pub fn clear_all(&self) {
        for entry in &self.entries {
            entry.value().cancelled.store(true, Ordering::Relaxed);
        }
        self.entries.clear();
    }

    fn arm(&self, id: TimerId, period: Duration, cancelled: Arc<AtomicBool>) {
        let ready = self.ready_tx.lock().clone();
        std::thread::spawn(move || {
            std::thread::sleep(period);
            if !cancelled.load(Ordering::Relaxed) {
                // The registry (and its receiver) may be gone if the
                // instance was dropped mid-sleep.
                let _ = ready.send(id);
            }
        });
    }

    /// Runs expired timers until none remain, then returns.
    ///
    /// A callback error cancels all outstanding timers and fails the
    /// drain; the caller turns that into the call's outcome.
    pub fn drain(&self, engine: &Engine, ast: &AST) -> Result<(), BridgeError> {
        let ready = self.ready_rx.lock();
        while !self.entries.is_empty() {
            let id = match ready.recv_timeout(DRAIN_POLL_INTERVAL) {
                Ok(id) => id,
                // Timeout re-checks emptiness so a cancellation that never
                // posts a ready notification cannot wedge the loop.
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // Snapshot and release the map entry before running script:
            // the callback may itself register or cancel timers.
            let Some((callback, args, period, repeating)) = self
                .entries
                .get(&id)
                .map(|e| (e.callback.clone(), e.args.clone(), e.period, e.repeating))
            else {
                trace!(timer_id = id, "Skipping timer cancelled after expiry");
                continue;
            };

            debug!(timer_id = id, repeating, "Firing timer callback");
            if let Err(err) = callback.call::<Dynamic>(engine, ast, args) {
                self.clear_all();
                return Err(BridgeError::script(describe_eval_error(&err)));
            }

            if repeating {
                // The callback may have cancelled its own interval.
                if let Some(entry) = self.entries.get(&id) {
                    let cancelled = Arc::clone(&entry.cancelled);
                    drop(entry);
                    self.arm(id, period, cancelled);
                }
            } else {
                self.entries.remove(&id);
            }
        }
        Ok(())
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("live", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_engine(counter: Arc<AtomicUsize>) -> (Engine, AST) {
        let mut engine = Engine::new();
        engine.register_fn("record", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let ast = engine.compile("fn tick() { record(); }").unwrap();
        (engine, ast)
    }

    #[test]
    fn test_one_shot_timer_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (engine, ast) = counting_engine(Arc::clone(&counter));
        let registry = TimerRegistry::new();

        registry.register(FnPtr::new("tick").unwrap(), 5, Vec::new(), false);
        registry.drain(&engine, &ast).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (engine, ast) = counting_engine(Arc::clone(&counter));
        let registry = TimerRegistry::new();

        let id = registry.register(FnPtr::new("tick").unwrap(), 50, Vec::new(), false);
        registry.cancel(id);
        registry.drain(&engine, &ast).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancellation_after_expiry_is_discarded() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (engine, ast) = counting_engine(Arc::clone(&counter));
        let registry = TimerRegistry::new();

        let doomed = registry.register(FnPtr::new("tick").unwrap(), 1, Vec::new(), false);
        registry.register(FnPtr::new("tick").unwrap(), 1, Vec::new(), false);
        // Let both sleepers post their ready notifications first.
        std::thread::sleep(Duration::from_millis(20));
        registry.cancel(doomed);

        registry.drain(&engine, &ast).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interval_re_arms_until_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(TimerRegistry::new());
        let interval_id = Arc::new(AtomicI64::new(0));

        let mut engine = Engine::new();
        {
            let counter = Arc::clone(&counter);
            let registry = Arc::clone(&registry);
            let interval_id = Arc::clone(&interval_id);
            engine.register_fn("record", move || {
                let fired = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if fired >= 3 {
                    registry.cancel(interval_id.load(Ordering::SeqCst));
                }
            });
        }
        let ast = engine.compile("fn tick() { record(); }").unwrap();

        let id = registry.register(FnPtr::new("tick").unwrap(), 2, Vec::new(), true);
        interval_id.store(id, Ordering::SeqCst);
        registry.drain(&engine, &ast).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_callback_error_clears_outstanding_timers() {
        let engine = Engine::new();
        let ast = engine
            .compile(r#"fn explode() { throw "timer boom"; }"#)
            .unwrap();
        let registry = TimerRegistry::new();

        registry.register(FnPtr::new("explode").unwrap(), 1, Vec::new(), false);
        registry.register(FnPtr::new("explode").unwrap(), 500, Vec::new(), false);

        let err = registry.drain(&engine, &ast).unwrap_err();
        assert!(err.is_script());
        assert!(err.to_string().contains("timer boom"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_callback_arguments_are_forwarded() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::new();
        {
            let seen = Arc::clone(&seen);
            engine.register_fn("record", move |value: i64| {
                seen.lock().push(value);
            });
        }
        let ast = engine.compile("fn tick(value) { record(value); }").unwrap();
        let registry = TimerRegistry::new();

        registry.register(
            FnPtr::new("tick").unwrap(),
            1,
            vec![Dynamic::from(42_i64)],
            false,
        );
        registry.drain(&engine, &ast).unwrap();

        assert_eq!(*seen.lock(), vec![42]);
    }
}
