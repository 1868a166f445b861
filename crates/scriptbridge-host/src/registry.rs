//! Service objects and the per-invocation handle registry.
//!
//! Operations that return an object (a data collection, today) hand the
//! script an opaque integer handle instead of a shared object graph. The
//! registry is an append-only arena living inside one transaction's
//! context; handles from one invocation are meaningless in any other.

use std::sync::Arc;

use parking_lot::Mutex;
use scriptbridge_common::error::ServiceError;
use scriptbridge_core::{Args, ScriptValue};

/// What a service method hands back to the dispatcher.
pub enum ServiceReply {
    Unit,
    Value(ScriptValue),
    /// A nested service object; the dispatcher registers it and replies
    /// with its handle.
    Object(Arc<dyn ServiceObject>),
}

impl ServiceReply {
    /// Convenience for boolean-valued replies.
    pub fn bool(value: bool) -> Self {
        ServiceReply::Value(ScriptValue::Bool(value))
    }

    /// Convenience for string-valued replies.
    pub fn text(value: impl Into<String>) -> Self {
        ServiceReply::Value(ScriptValue::Text(value.into()))
    }

    /// Convenience for JSON-valued replies.
    pub fn json(value: serde_json::Value) -> Self {
        ServiceReply::Value(ScriptValue::Json(value))
    }
}

impl std::fmt::Debug for ServiceReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceReply::Unit => f.write_str("Unit"),
            ServiceReply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ServiceReply::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// One method-addressable host object.
pub trait ServiceObject: Send + Sync {
    /// Routes a method call on this object.
    ///
    /// Unknown method names are contract violations: the glue and the
    /// services are versioned together, so a mismatch is a defect.
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError>;
}

/// Arena of objects returned to the script during one invocation.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: Mutex<Vec<Arc<dyn ServiceObject>>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object, returning its handle.
    pub fn register(&self, object: Arc<dyn ServiceObject>) -> u64 {
        let mut objects = self.objects.lock();
        let handle = objects.len() as u64;
        objects.push(object);
        handle
    }

    /// Looks a handle up; `None` for handles this registry never issued.
    pub fn resolve(&self, handle: u64) -> Option<Arc<dyn ServiceObject>> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| self.objects.lock().get(index).map(Arc::clone))
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("objects", &self.len())
            .finish_non_exhaustive()
    }
}
