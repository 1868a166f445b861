//! The per-transaction host context.
//!
//! One [`TransactionContext`] is built for every Init/Invoke/Query call
//! and owns that call's service bindings, object registry, and event
//! buffer. It is the [`HostDispatcher`] the engine instance calls into:
//! requests addressed to a well-known service route by name, requests
//! addressed to a handle route through the registry. The context dies with
//! the call; nothing in it outlives one transaction except the shared
//! scan coordinator and HTTP client it was handed.

use std::sync::Arc;

use scriptbridge_common::coordinator::ScanCoordinator;
use scriptbridge_common::error::ServiceError;
use scriptbridge_common::ledger::LedgerStub;
use scriptbridge_common::telemetry::LogLevelHandle;
use scriptbridge_core::{Args, CallTarget, DispatchReply, HostDispatcher, ServiceRequest};

use crate::data::DataService;
use crate::event::EventService;
use crate::http::HttpService;
use crate::identity::IdentityService;
use crate::logging::LoggingService;
use crate::query::QueryService;
use crate::registry::{ObjectRegistry, ServiceObject, ServiceReply};

pub struct TransactionContext {
    registry: ObjectRegistry,
    data: DataService,
    identity: IdentityService,
    event: EventService,
    http: HttpService,
    query: QueryService,
    logging: LoggingService,
}

impl TransactionContext {
    pub fn new(
        stub: Arc<dyn LedgerStub>,
        coordinator: ScanCoordinator,
        http_client: Arc<reqwest::blocking::Client>,
        level_handle: Option<LogLevelHandle>,
        default_level: &str,
    ) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            data: DataService::new(Arc::clone(&stub), coordinator.clone()),
            identity: IdentityService::new(Arc::clone(&stub)),
            event: EventService::new(),
            http: HttpService::new(http_client),
            query: QueryService::new(Arc::clone(&stub), coordinator),
            logging: LoggingService::new(stub, level_handle, default_level),
        }
    }

    /// Drain the events buffered during this transaction.
    ///
    /// Called exactly once by the entry point, and only when the
    /// transaction is about to commit.
    pub fn take_events(&self) -> Vec<serde_json::Value> {
        self.event.take_batch()
    }

    fn service(&self, name: &str) -> Result<&dyn ServiceObject, ServiceError> {
        match name {
            "data" => Ok(&self.data),
            "identity" => Ok(&self.identity),
            "event" => Ok(&self.event),
            "http" => Ok(&self.http),
            "query" => Ok(&self.query),
            "logging" => Ok(&self.logging),
            other => Err(ServiceError::violation(format!(
                "unknown service '{other}'"
            ))),
        }
    }

    fn translate(&self, reply: ServiceReply) -> DispatchReply {
        match reply {
            ServiceReply::Unit => DispatchReply::Unit,
            ServiceReply::Value(value) => DispatchReply::Value(value),
            ServiceReply::Object(object) => DispatchReply::Handle(self.registry.register(object)),
        }
    }
}

impl HostDispatcher for TransactionContext {
    fn dispatch(&self, request: ServiceRequest) -> Result<DispatchReply, ServiceError> {
        let args = Args::new(&request.args);
        let reply = match &request.target {
            CallTarget::Service(name) => self.service(name)?.invoke(&request.method, args)?,
            CallTarget::Handle(handle) => self
                .registry
                .resolve(*handle)
                .ok_or_else(|| ServiceError::violation(format!("unknown object handle {handle}")))?
                .invoke(&request.method, args)?,
        };
        Ok(self.translate(reply))
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("objects", &self.registry.len())
            .field("pending_events", &self.event.pending())
            .finish_non_exhaustive()
    }
}
