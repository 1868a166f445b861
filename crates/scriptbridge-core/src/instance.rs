//! Pooled engine instances and the host natives they expose.
//!
//! An [`EngineInstance`] owns one script engine with the glue prelude and
//! the business-logic bundle compiled in. Each entry-point call installs a
//! per-call [`HostDispatcher`] and completion producer into the instance's
//! invocation slot, runs `__dispatch`, drains timers, and then reads the
//! outcome:
//!
//! ```text
//!   install slot ──▶ __dispatch ──▶ drain timers ──▶ uninstall ──▶ outcome
//!                        │                                │
//!                   __host_call                    violation wins,
//!                   __host_complete                then script error,
//!                   __host_violation               then completion
//! ```
//!
//! A contract violation recorded anywhere in that sequence poisons the
//! instance; the pool discards poisoned instances instead of reusing them.

use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{AST, Dynamic, Engine, EvalAltResult, FnPtr, Position, Scope};
use scriptbridge_common::error::{BridgeError, ServiceError};
use tracing::{debug, instrument, warn};

use crate::bundle::ScriptBundle;
use crate::completion::{CompletionProducer, completion_channel};
use crate::marshal::{describe_error_value, describe_eval_error, dynamic_to_value, value_to_dynamic};
use crate::prelude::PRELUDE_SOURCE;
use crate::protocol::{CallTarget, DispatchReply, EntryPoint, HostDispatcher, ServiceRequest};
use crate::timer::TimerRegistry;

fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(Dynamic::from(message.into()), Position::NONE).into()
}

struct ActiveInvocation {
    dispatcher: Arc<dyn HostDispatcher>,
    completion: Option<CompletionProducer>,
    violation: Option<String>,
}

/// Per-call state shared between the host and the registered natives.
///
/// Empty between calls. Natives invoked outside an active call (a bundle
/// body statement, for instance) fail with a plain runtime error.
#[derive(Default)]
struct InvocationSlot {
    inner: Mutex<Option<ActiveInvocation>>,
}

impl InvocationSlot {
    fn install(&self, dispatcher: Arc<dyn HostDispatcher>, completion: CompletionProducer) {
        *self.inner.lock() = Some(ActiveInvocation {
            dispatcher,
            completion: Some(completion),
            violation: None,
        });
    }

    /// Tears the call down, closing the completion channel if the script
    /// never resolved it. Returns the first recorded violation.
    fn uninstall(&self) -> Option<String> {
        self.inner.lock().take().and_then(|active| active.violation)
    }

    fn record_violation(&self, message: &str) {
        if let Some(active) = self.inner.lock().as_mut() {
            if active.violation.is_none() {
                active.violation = Some(message.to_string());
            }
        }
    }

    /// Records a violation and builds the error that unwinds the script.
    ///
    /// The unwind is advisory: a bundle may catch it, but the recorded
    /// flag still fails and poisons the call at teardown.
    fn violate(&self, message: String) -> Box<EvalAltResult> {
        warn!(message = %message, "Contract violation raised by script");
        self.record_violation(&message);
        runtime_error(format!("contract violation: {message}"))
    }

    fn host_call(
        &self,
        target: &Dynamic,
        method: &str,
        args: &[Dynamic],
    ) -> Result<rhai::Map, Box<EvalAltResult>> {
        let target = match parse_target(target) {
            Ok(target) => target,
            Err(message) => return Err(self.violate(message)),
        };
        let args = match args.iter().map(dynamic_to_value).collect::<Result<Vec<_>, _>>() {
            Ok(args) => args,
            Err(err) => return Err(self.violate(err.to_string())),
        };

        // Clone the dispatcher out so no lock is held across the host
        // call, which may perform blocking ledger or network I/O.
        let dispatcher = self
            .inner
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.dispatcher))
            .ok_or_else(|| runtime_error("host call outside an active invocation"))?;

        let request = ServiceRequest::new(target, method, args);
        match dispatcher.dispatch(request) {
            Ok(DispatchReply::Unit) => {
                let mut reply = rhai::Map::new();
                reply.insert("ok".into(), Dynamic::UNIT);
                Ok(reply)
            }
            Ok(DispatchReply::Value(value)) => {
                let mut reply = rhai::Map::new();
                reply.insert("ok".into(), value_to_dynamic(&value)?);
                Ok(reply)
            }
            Ok(DispatchReply::Handle(handle)) => {
                let handle = i64::try_from(handle)
                    .map_err(|_| self.violate("object handle overflow".to_string()))?;
                let mut reply = rhai::Map::new();
                reply.insert("handle".into(), Dynamic::from(handle));
                Ok(reply)
            }
            Err(ServiceError::Violation { message }) => Err(self.violate(message)),
            Err(ServiceError::Failed { message }) => {
                let mut error = rhai::Map::new();
                error.insert("message".into(), Dynamic::from(message));
                let mut reply = rhai::Map::new();
                reply.insert("err".into(), Dynamic::from(error));
                Ok(reply)
            }
        }
    }

    fn host_complete(&self, err: &Dynamic, value: &Dynamic) -> Result<(), Box<EvalAltResult>> {
        let producer = {
            let mut guard = self.inner.lock();
            let Some(active) = guard.as_mut() else {
                return Err(runtime_error("completion outside an active invocation"));
            };
            let producer = active.completion.take();
            drop(guard);
            match producer {
                Some(producer) => producer,
                None => {
                    return Err(
                        self.violate("completion callback invoked more than once".to_string())
                    );
                }
            }
        };

        if !err.is_unit() {
            producer.reject(describe_error_value(err));
            return Ok(());
        }
        if value.is_unit() {
            producer.resolve(Vec::new());
            return Ok(());
        }
        let json: serde_json::Value = rhai::serde::from_dynamic(value)
            .map_err(|err| self.violate(format!("completion value cannot be serialized: {err}")))?;
        let payload = serde_json::to_vec(&json)
            .map_err(|err| self.violate(format!("completion value cannot be serialized: {err}")))?;
        producer.resolve(payload);
        Ok(())
    }

    fn host_violation(&self, message: &str) -> Result<(), Box<EvalAltResult>> {
        Err(self.violate(message.to_string()))
    }
}

fn parse_target(target: &Dynamic) -> Result<CallTarget, String> {
    if let Some(name) = target.clone().try_cast::<String>() {
        return Ok(CallTarget::Service(name));
    }
    if let Some(handle) = target.clone().try_cast::<i64>() {
        return u64::try_from(handle)
            .map(CallTarget::Handle)
            .map_err(|_| format!("invalid object handle {handle}"));
    }
    Err(format!(
        "host call target must be a service name or handle, not '{}'",
        target.type_name()
    ))
}

/// One reusable script engine with glue and bundle compiled in.
pub struct EngineInstance {
    engine: Engine,
    ast: AST,
    timers: Arc<TimerRegistry>,
    slot: Arc<InvocationSlot>,
    poisoned: bool,
}

impl EngineInstance {
    /// Builds a fresh instance for the given bundle: registers the host
    /// natives, compiles the glue prelude, and merges the bundle in.
    pub fn fabricate(bundle: &ScriptBundle) -> Result<Self, BridgeError> {
        let mut engine = Engine::new();
        let timers = Arc::new(TimerRegistry::new());
        let slot = Arc::new(InvocationSlot::default());

        {
            let slot = Arc::clone(&slot);
            engine.register_fn(
                "__host_call",
                move |target: Dynamic, method: &str, args: rhai::Array| {
                    slot.host_call(&target, method, &args)
                },
            );
        }
        {
            let slot = Arc::clone(&slot);
            engine.register_fn("__host_complete", move |err: Dynamic, value: Dynamic| {
                slot.host_complete(&err, &value)
            });
        }
        {
            let slot = Arc::clone(&slot);
            engine.register_fn("__host_violation", move |message: &str| {
                slot.host_violation(message)
            });
        }

        {
            let timers = Arc::clone(&timers);
            engine.register_fn("set_timeout", move |callback: FnPtr, delay: i64| {
                timers.register(callback, delay, Vec::new(), false)
            });
        }
        {
            let timers = Arc::clone(&timers);
            engine.register_fn(
                "set_timeout",
                move |callback: FnPtr, delay: i64, args: rhai::Array| {
                    timers.register(callback, delay, args, false)
                },
            );
        }
        {
            let timers = Arc::clone(&timers);
            engine.register_fn("set_interval", move |callback: FnPtr, delay: i64| {
                timers.register(callback, delay, Vec::new(), true)
            });
        }
        {
            let timers = Arc::clone(&timers);
            engine.register_fn(
                "set_interval",
                move |callback: FnPtr, delay: i64, args: rhai::Array| {
                    timers.register(callback, delay, args, true)
                },
            );
        }
        {
            let timers = Arc::clone(&timers);
            engine.register_fn("clear_timeout", move |id: i64| timers.cancel(id));
        }
        {
            let timers = Arc::clone(&timers);
            engine.register_fn("clear_interval", move |id: i64| timers.cancel(id));
        }

        let glue = engine
            .compile(PRELUDE_SOURCE)
            .map_err(|err| BridgeError::invalid_bundle(format!("glue compilation failed: {err}")))?;
        let ast = glue.merge(bundle.ast());

        debug!(
            content_hash = format!("{:016x}", bundle.content_hash()),
            "Fabricated engine instance"
        );
        Ok(Self {
            engine,
            ast,
            timers,
            slot,
            poisoned: false,
        })
    }

    /// Runs one entry-point call to completion.
    ///
    /// The dispatcher carries the per-transaction services; it is
    /// installed for the duration of this call only. See the module
    /// documentation for the outcome precedence.
    #[instrument(skip(self, dispatcher, parameters), fields(entry = %entry, function = %function))]
    pub fn run(
        &mut self,
        entry: EntryPoint,
        dispatcher: Arc<dyn HostDispatcher>,
        function: &str,
        parameters: &[String],
    ) -> Result<Vec<u8>, BridgeError> {
        let (producer, consumer) = completion_channel();
        self.slot.install(dispatcher, producer);

        let parameters: rhai::Array = parameters
            .iter()
            .map(|parameter| Dynamic::from(parameter.clone()))
            .collect();
        let mut scope = Scope::new();
        debug!("Dispatching into script");
        let script_result = self.engine.call_fn::<Dynamic>(
            &mut scope,
            &self.ast,
            "__dispatch",
            (entry.name().to_string(), function.to_string(), parameters),
        );

        // Deferred work queued by the entry function runs before the
        // outcome is read; a script that raised forfeits its timers.
        let drain_result = if script_result.is_ok() {
            self.timers.drain(&self.engine, &self.ast)
        } else {
            self.timers.clear_all();
            Ok(())
        };

        let violation = self.slot.uninstall();
        if let Some(message) = violation {
            self.poisoned = true;
            self.timers.clear_all();
            warn!(message = %message, "Instance poisoned by contract violation");
            return Err(BridgeError::contract_violation(message));
        }
        if let Err(err) = script_result {
            debug!("Script raised before completing");
            return Err(BridgeError::script(describe_eval_error(&err)));
        }
        drain_result?;
        consumer.take()
    }

    /// Whether a contract violation has made this instance unsafe to
    /// reuse.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

impl std::fmt::Debug for EngineInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInstance")
            .field("poisoned", &self.poisoned)
            .field("live_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
