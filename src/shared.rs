//! ═══════════════════════════════════════════════════════════════════════════════
//! SHARED — One Evolving Model Behind Many Rollout Workers
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Independent simulation runs each own an independent fabric and need no
//! synchronization. When a batch of rollouts is meant to feed ONE evolving
//! weight set, the engine becomes shared mutable state: this wrapper guards
//! it with a lock so every correction reads a consistent weight snapshot and
//! every learning step is exclusive.
//!
//! Corrections mutate engine bookkeeping (magnitude window, trip counter),
//! so both paths take the write lock; the read lock serves the pure
//! diagnostic accessors.
//! ═══════════════════════════════════════════════════════════════════════════════

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::FabricConfig;
use crate::engine::{Correction, EngineStats, GravityEngine};

/// Cloneable handle to a lock-guarded gravity engine
#[derive(Debug, Clone)]
pub struct SharedGravityEngine {
    inner: Arc<RwLock<GravityEngine>>,
}

impl SharedGravityEngine {
    pub fn new(config: &FabricConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(GravityEngine::new(config))),
        }
    }

    /// Wrap an already-trained engine
    pub fn from_engine(engine: GravityEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Correct a predicted value against a consistent weight snapshot.
    /// The lock is held for the whole gravity computation — no torn reads
    /// of a weight vector mid-update.
    pub fn correct(&self, basis: &BTreeMap<String, f64>, predicted: f64) -> f64 {
        self.inner.write().correct(basis, predicted)
    }

    /// Full correction detail under the same locking discipline
    pub fn compute_correction(&self, basis: &BTreeMap<String, f64>) -> Correction {
        self.inner.write().compute_correction(basis)
    }

    /// Exclusive learning step
    pub fn learn(&self, residual: f64, basis: &BTreeMap<String, f64>) {
        self.inner.write().update_weights(residual, basis);
    }

    /// Read-only weight lookup
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.inner.read().weight(name)
    }

    /// Read-only stats snapshot
    pub fn stats(&self) -> EngineStats {
        self.inner.read().stats()
    }

    /// Clone out the full engine state (e.g. to freeze a copy for a
    /// no-learning evaluation run)
    pub fn to_engine(&self) -> GravityEngine {
        self.inner.read().clone()
    }
}
