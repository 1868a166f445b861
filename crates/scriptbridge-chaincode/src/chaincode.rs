//! The chaincode facade the host ledger calls into.
//!
//! [`ScriptChaincode`] is built once per container from the business-logic
//! bundle source and the bridge configuration. Each ledger call checks an
//! engine instance out of the pool, builds a fresh per-transaction
//! [`TransactionContext`] around the call's stub, runs the bundle's entry
//! function to completion, and returns the instance. Events buffered during
//! a successful Init or Invoke are flushed as one named batch before the
//! call returns; Query never commits, so it never flushes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scriptbridge_common::config::BridgeConfig;
use scriptbridge_common::config_file::ConfigFile;
use scriptbridge_common::coordinator::ScanCoordinator;
use scriptbridge_common::error::BridgeError;
use scriptbridge_common::ledger::{LOG_LEVEL_STATE_KEY, LedgerStub};
use scriptbridge_common::telemetry::{LogLevelHandle, initial_level, normalize_level};
use scriptbridge_core::{EnginePool, EntryPoint, HostDispatcher, ScriptBundle};
use scriptbridge_host::{EVENT_CHANNEL, TransactionContext, build_client};
use tracing::{debug, info, instrument, warn};

pub struct ScriptChaincode {
    pool: EnginePool,
    coordinator: ScanCoordinator,
    http_client: Arc<reqwest::blocking::Client>,
    config: BridgeConfig,
    log_handle: Option<LogLevelHandle>,
}

impl ScriptChaincode {
    /// Compiles the bundle and prepares the pool and shared HTTP client.
    ///
    /// One instance is fabricated eagerly so a bundle that compiles but
    /// cannot link against the glue fails deployment here rather than on
    /// the first transaction.
    pub fn new(bundle_source: &str, config: BridgeConfig) -> Result<Self, BridgeError> {
        let bundle = Arc::new(ScriptBundle::compile(bundle_source)?);
        let pool = EnginePool::new(Arc::clone(&bundle), config.pool.size);
        pool.prime()?;

        info!(
            pool_capacity = config.pool.size,
            content_hash = format!("{:016x}", bundle.content_hash()),
            "Chaincode ready"
        );
        Ok(Self {
            pool,
            coordinator: ScanCoordinator::new(),
            http_client: Arc::new(build_client(&config.http)),
            config,
            log_handle: None,
        })
    }

    /// Builds a chaincode from a TOML configuration file.
    ///
    /// The file carries the bridge settings and names the bundle to load;
    /// a relative bundle path resolves against the file's directory.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let file =
            ConfigFile::from_file(path).map_err(|err| BridgeError::invalid_config(err.to_string()))?;
        let entry = file
            .bundle
            .ok_or_else(|| BridgeError::invalid_config("config file names no bundle"))?;
        let bundle_path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(&entry.path),
            _ => PathBuf::from(&entry.path),
        };
        let source = std::fs::read_to_string(&bundle_path).map_err(|err| {
            BridgeError::invalid_config(format!(
                "Failed to read bundle '{}': {err}",
                bundle_path.display()
            ))
        })?;
        Self::new(&source, file.bridge)
    }

    /// Attaches the reload handle returned by `telemetry::init` so
    /// persisted and script-requested level changes reach the live
    /// subscriber.
    pub fn with_log_handle(mut self, handle: LogLevelHandle) -> Self {
        self.log_handle = Some(handle);
        self
    }

    /// Deploy-time initialization.
    pub fn init(&self, stub: Arc<dyn LedgerStub>) -> Result<Vec<u8>, BridgeError> {
        self.call(EntryPoint::Init, stub)
    }

    /// A state-changing transaction.
    pub fn invoke(&self, stub: Arc<dyn LedgerStub>) -> Result<Vec<u8>, BridgeError> {
        self.call(EntryPoint::Invoke, stub)
    }

    /// A read-only query; buffered events are discarded, never flushed.
    pub fn query(&self, stub: Arc<dyn LedgerStub>) -> Result<Vec<u8>, BridgeError> {
        self.call(EntryPoint::Query, stub)
    }

    #[instrument(
        skip(self, stub),
        fields(
            entry = %entry,
            transaction_id = %stub.transaction_id(),
            function = tracing::field::Empty,
        )
    )]
    fn call(&self, entry: EntryPoint, stub: Arc<dyn LedgerStub>) -> Result<Vec<u8>, BridgeError> {
        let (function, parameters) = stub.function_and_parameters();
        tracing::Span::current().record("function", function.as_str());
        info!(parameter_count = parameters.len(), "Handling ledger call");

        self.apply_effective_log_level(&stub);

        let context = Arc::new(TransactionContext::new(
            Arc::clone(&stub),
            self.coordinator.clone(),
            Arc::clone(&self.http_client),
            self.log_handle.clone(),
            &self.config.logging.default_level,
        ));
        let dispatcher: Arc<dyn HostDispatcher> = context.clone();

        let mut instance = self.pool.checkout();
        let result = instance.run(entry, dispatcher, &function, &parameters);
        self.pool.give_back(instance);

        let payload = result.inspect_err(|err| debug!(%err, "Ledger call failed"))?;
        if entry != EntryPoint::Query {
            self.flush_events(&stub, &context)?;
        }
        Ok(payload)
    }

    /// Resolves the effective level for this call and applies it.
    ///
    /// Precedence: persisted state value, else the environment override,
    /// else the configured default. Resolution failures never fail the
    /// transaction; logging stays at whatever level was last applied.
    fn apply_effective_log_level(&self, stub: &Arc<dyn LedgerStub>) {
        let Some(handle) = &self.log_handle else {
            return;
        };
        let persisted = match stub.get_state(LOG_LEVEL_STATE_KEY) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "Could not read the persisted log level");
                None
            }
        };
        let level = persisted
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .as_deref()
            .and_then(normalize_level)
            .unwrap_or_else(|| initial_level(&self.config.logging.default_level));
        if let Err(err) = handle.set(level) {
            warn!(%err, "Could not apply the effective log level");
        }
    }

    fn flush_events(
        &self,
        stub: &Arc<dyn LedgerStub>,
        context: &TransactionContext,
    ) -> Result<(), BridgeError> {
        let batch = context.take_events();
        if batch.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_vec(&batch)
            .map_err(|err| BridgeError::script(format!("event batch cannot be serialized: {err}")))?;
        stub.set_event(EVENT_CHANNEL, &payload)?;
        info!(count = batch.len(), "Flushed event batch");
        Ok(())
    }

    /// Number of engine instances currently idle in the pool.
    pub fn idle_instances(&self) -> usize {
        self.pool.idle_count()
    }
}

impl std::fmt::Debug for ScriptChaincode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptChaincode")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
