//! Script engine embedding for the bridge.
//!
//! This crate owns everything that runs inside the embedded script engine:
//! bundle compilation, the glue prelude, pooled engine instances, the
//! typed host-call protocol, and the completion and timer machinery that
//! turns a callback-style transaction function into one synchronous call.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────────┐
//!  │                        EnginePool                          │
//!  │   ┌────────────────────────────────────────────────────┐   │
//!  │   │                  EngineInstance                    │   │
//!  │   │   glue prelude + ScriptBundle (merged AST)         │   │
//!  │   │   __host_call ──▶ ServiceRequest ──▶ dispatcher    │   │
//!  │   │   __host_complete ──▶ completion channel           │   │
//!  │   │   set_timeout / set_interval ──▶ TimerRegistry     │   │
//!  │   └────────────────────────────────────────────────────┘   │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host side of the protocol (services, object registry, ledger
//! access) lives elsewhere; this crate sees it only as a
//! [`HostDispatcher`].

pub mod bundle;
pub mod completion;
pub mod instance;
pub mod marshal;
pub mod pool;
pub mod prelude;
pub mod protocol;
pub mod timer;
pub mod value;

pub use bundle::ScriptBundle;
pub use instance::EngineInstance;
pub use pool::EnginePool;
pub use protocol::{CallTarget, DispatchReply, EntryPoint, HostDispatcher, ServiceRequest};
pub use value::{Args, ScriptValue};
