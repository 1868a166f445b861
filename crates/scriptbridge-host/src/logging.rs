//! Script-visible logging with persisted verbosity.
//!
//! Log lines from business logic flow into the host's tracing subscriber
//! under the `script` target. The effective level is persisted in ledger
//! state under [`LOG_LEVEL_STATE_KEY`] so it survives container restarts;
//! `set_level` both applies the change to the live subscriber and writes
//! it back.

use std::sync::Arc;

use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::{LOG_LEVEL_STATE_KEY, LedgerStub};
use scriptbridge_common::telemetry::{LogLevelHandle, normalize_level};
use scriptbridge_core::{Args, ScriptValue};
use tracing::{debug, error, info, trace, warn};

use crate::registry::{ServiceObject, ServiceReply};

pub struct LoggingService {
    stub: Arc<dyn LedgerStub>,
    handle: Option<LogLevelHandle>,
    default_level: String,
}

impl LoggingService {
    /// `handle` is `None` when no reloadable subscriber is installed, as in
    /// tests; level changes are then persisted without a live effect.
    pub fn new(
        stub: Arc<dyn LedgerStub>,
        handle: Option<LogLevelHandle>,
        default_level: &str,
    ) -> Self {
        Self {
            stub,
            handle,
            default_level: default_level.to_string(),
        }
    }

    /// Fire-and-forget: an unknown level falls back to `info`, and the
    /// message may be any shape the script produced.
    fn log(&self, level: &str, message: &str) {
        match normalize_level(level) {
            Some("trace") => trace!(target: "script", "{message}"),
            Some("debug") => debug!(target: "script", "{message}"),
            Some("warn") => warn!(target: "script", "{message}"),
            Some("error") => error!(target: "script", "{message}"),
            _ => info!(target: "script", "{message}"),
        }
    }

    fn get_level(&self) -> Result<ServiceReply, ServiceError> {
        let level = match self.stub.get_state(LOG_LEVEL_STATE_KEY)? {
            Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
            _ => normalize_level(&self.default_level)
                .unwrap_or("info")
                .to_uppercase(),
        };
        Ok(ServiceReply::text(level))
    }

    fn set_level(&self, level: &str) -> Result<ServiceReply, ServiceError> {
        let Some(normalized) = normalize_level(level) else {
            return Err(ServiceError::failed(format!("Invalid log level '{level}'")));
        };
        if let Some(handle) = &self.handle {
            if let Err(err) = handle.set(normalized) {
                warn!(%err, "Log level reload failed; the persisted value takes effect on restart");
            }
        }
        self.stub
            .put_state(LOG_LEVEL_STATE_KEY, normalized.to_uppercase().as_bytes())?;
        Ok(ServiceReply::Unit)
    }
}

/// Render any script value as a log message.
fn render(value: Option<&ScriptValue>) -> String {
    match value {
        None | Some(ScriptValue::Unit) => String::new(),
        Some(ScriptValue::Bool(flag)) => flag.to_string(),
        Some(ScriptValue::Int(n)) => n.to_string(),
        Some(ScriptValue::Float(f)) => f.to_string(),
        Some(ScriptValue::Text(text)) => text.clone(),
        Some(ScriptValue::Json(value)) => value.to_string(),
    }
}

impl ServiceObject for LoggingService {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "log" => {
                self.log(args.text(0, "level")?, &render(args.value(1)));
                Ok(ServiceReply::Unit)
            }
            "get_level" => self.get_level(),
            "set_level" => self.set_level(args.text(0, "level")?),
            other => Err(ServiceError::violation(format!(
                "unknown logging service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for LoggingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingService")
            .field("default_level", &self.default_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptbridge_common::memory::MemoryLedgerStub;

    fn service(stub: &Arc<MemoryLedgerStub>) -> LoggingService {
        let stub: Arc<dyn LedgerStub> = Arc::clone(stub) as Arc<dyn LedgerStub>;
        LoggingService::new(stub, None, "info")
    }

    fn reply_text(reply: &ServiceReply) -> &str {
        match reply {
            ServiceReply::Value(ScriptValue::Text(text)) => text,
            other => panic!("expected a text reply, got {other:?}"),
        }
    }

    #[test]
    fn test_get_level_defaults_when_nothing_is_persisted() {
        let stub = Arc::new(MemoryLedgerStub::new());
        let reply = service(&stub).get_level().unwrap();
        assert_eq!(reply_text(&reply), "INFO");
    }

    #[test]
    fn test_get_level_prefers_the_persisted_value() {
        let stub = Arc::new(MemoryLedgerStub::new());
        stub.seed(LOG_LEVEL_STATE_KEY, "ERROR");
        let reply = service(&stub).get_level().unwrap();
        assert_eq!(reply_text(&reply), "ERROR");
    }

    #[test]
    fn test_set_level_persists_the_normalized_uppercase_form() {
        let stub = Arc::new(MemoryLedgerStub::new());
        service(&stub).set_level("WARNING").unwrap();
        assert_eq!(
            stub.get_state(LOG_LEVEL_STATE_KEY).unwrap(),
            Some(b"WARN".to_vec())
        );
    }

    #[test]
    fn test_set_level_rejects_unknown_levels() {
        let stub = Arc::new(MemoryLedgerStub::new());
        let err = service(&stub).set_level("verbose").unwrap_err();
        assert!(!err.is_violation());
        assert_eq!(err.to_string(), "Invalid log level 'verbose'");
        assert_eq!(stub.get_state(LOG_LEVEL_STATE_KEY).unwrap(), None);
    }

    #[test]
    fn test_log_accepts_any_message_shape() {
        let stub = Arc::new(MemoryLedgerStub::new());
        let logging = service(&stub);
        for message in [
            ScriptValue::from("plain"),
            ScriptValue::Int(42),
            ScriptValue::Json(serde_json::json!({"nested": true})),
            ScriptValue::Unit,
        ] {
            let args = [ScriptValue::from("debug"), message];
            let reply = logging.invoke("log", Args::new(&args)).unwrap();
            assert!(matches!(reply, ServiceReply::Unit));
        }
    }

    #[test]
    fn test_unknown_method_is_a_violation() {
        let stub = Arc::new(MemoryLedgerStub::new());
        let err = service(&stub)
            .invoke("flush", Args::new(&[]))
            .unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn test_render_shapes() {
        assert_eq!(render(None), "");
        assert_eq!(render(Some(&ScriptValue::Bool(true))), "true");
        assert_eq!(
            render(Some(&ScriptValue::Json(serde_json::json!(["a", 1])))),
            "[\"a\",1]"
        );
    }
}
