//! The call protocol between pooled script instances and the host.
//!
//! Scripts reach the host through exactly one seam: a [`ServiceRequest`]
//! handed to a [`HostDispatcher`]. The request names either a well-known
//! service or a numeric handle to an object a previous call returned, and
//! carries typed [`ScriptValue`] arguments. The reply is equally narrow:
//! nothing, one value, or a fresh handle.

use std::sync::Arc;

use scriptbridge_common::error::ServiceError;

use crate::value::ScriptValue;

/// Entry points a deployed bundle exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Deployment-time initialization.
    Init,
    /// A state-changing transaction.
    Invoke,
    /// A read-only query; never commits events.
    Query,
}

impl EntryPoint {
    /// The entry function name dispatched inside the script.
    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::Init => "init",
            EntryPoint::Invoke => "invoke",
            EntryPoint::Query => "query",
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whom a host call addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// A well-known service, e.g. `"data"` or `"identity"`.
    Service(String),
    /// An object handle minted by an earlier reply.
    Handle(u64),
}

/// One method call from a script to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub target: CallTarget,
    pub method: String,
    pub args: Vec<ScriptValue>,
}

impl ServiceRequest {
    pub fn new(target: CallTarget, method: impl Into<String>, args: Vec<ScriptValue>) -> Self {
        Self {
            target,
            method: method.into(),
            args,
        }
    }
}

/// The host's answer to a [`ServiceRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchReply {
    /// The call succeeded and returned nothing.
    Unit,
    /// The call returned a value.
    Value(ScriptValue),
    /// The call returned an object, registered under this handle.
    Handle(u64),
}

/// Host side of the call protocol.
///
/// An implementation owns the per-transaction services and routes each
/// request to the addressed service or registered object. Implementations
/// must be callable from whichever thread currently runs the instance.
pub trait HostDispatcher: Send + Sync {
    fn dispatch(&self, request: ServiceRequest) -> Result<DispatchReply, ServiceError>;
}

impl<T: HostDispatcher + ?Sized> HostDispatcher for Arc<T> {
    fn dispatch(&self, request: ServiceRequest) -> Result<DispatchReply, ServiceError> {
        (**self).dispatch(request)
    }
}
