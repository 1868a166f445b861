//! Bounded reuse pool for engine instances.
//!
//! Fabricating an instance means compiling the glue and merging the
//! bundle, so instances are recycled across calls. The pool is a simple
//! bounded free list: checkout hands out an idle instance or fabricates a
//! fresh one, and give-back keeps the instance only while there is room
//! and it has not been poisoned. Checkouts beyond capacity always succeed;
//! capacity bounds retention, not concurrency.

use std::sync::Arc;

use parking_lot::Mutex;
use scriptbridge_common::error::BridgeError;
use tracing::{debug, warn};

use crate::bundle::ScriptBundle;
use crate::instance::EngineInstance;

pub struct EnginePool {
    idle: Mutex<Vec<EngineInstance>>,
    capacity: usize,
    bundle: Arc<ScriptBundle>,
}

impl EnginePool {
    /// Creates an empty pool over a shared bundle. Instances are
    /// fabricated lazily on first checkout.
    pub fn new(bundle: Arc<ScriptBundle>, capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            bundle,
        }
    }

    /// Takes an idle instance, fabricating one when none is available.
    ///
    /// # Panics
    ///
    /// Panics if fabrication fails. The bundle compiled at startup, so a
    /// failure here means the container cannot serve any request at all.
    pub fn checkout(&self) -> EngineInstance {
        if let Some(instance) = self.idle.lock().pop() {
            debug!("Reusing pooled engine instance");
            return instance;
        }
        debug!("Pool empty, fabricating engine instance");
        EngineInstance::fabricate(&self.bundle).expect("Failed to fabricate engine instance")
    }

    /// Returns an instance after a call.
    ///
    /// Poisoned instances are dropped; a full pool drops the surplus.
    pub fn give_back(&self, instance: EngineInstance) {
        if instance.is_poisoned() {
            warn!("Discarding poisoned engine instance");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(instance);
        } else {
            debug!("Pool full, discarding returned instance");
        }
    }

    /// Fabricates an instance outside the pool, surfacing the error.
    ///
    /// Used at startup to validate that the bundle links against the glue
    /// before the first transaction arrives.
    pub fn prime(&self) -> Result<(), BridgeError> {
        let instance = EngineInstance::fabricate(&self.bundle)?;
        self.give_back(instance);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of instances currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}
