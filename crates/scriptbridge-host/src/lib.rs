//! Host-side services behind the script/host call protocol.
//!
//! This crate implements the host half of the bridge: the service bindings
//! business logic sees (data collections, caller identity, events, outbound
//! HTTP, native queries, logging) and the [`TransactionContext`] that wires
//! them into one `HostDispatcher` per ledger call. Everything here talks to
//! the ledger through the `LedgerStub` trait; nothing in this crate touches
//! the script engine.

pub mod collection;
pub mod context;
pub mod data;
pub mod event;
pub mod http;
pub mod identity;
pub mod logging;
pub mod query;
pub mod registry;

pub use collection::DataCollection;
pub use context::TransactionContext;
pub use data::DataService;
pub use event::{EVENT_CHANNEL, EventService};
pub use http::{HttpService, build_client};
pub use identity::IdentityService;
pub use logging::LoggingService;
pub use query::QueryService;
pub use registry::{ObjectRegistry, ServiceObject, ServiceReply};
