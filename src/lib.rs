//! ═══════════════════════════════════════════════════════════════════════════════
//! GRAVITY FABRIC — Symbolic Residual Correction
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! An online-learning correction layer downstream of a causal simulation
//! engine. Latent symbolic signals (hope, despair, rage, fatigue, …) are held
//! as decaying pillars; a weighted combination of their intensities — the
//! gravity — nudges the engine's numeric predictions, and the weights learn
//! online from observed residuals.
//!
//! Data flow per turn:
//!   simulation state → PillarSystem::step → basis vector
//!                    → GravityEngine correction → corrected values
//!   ground truth − prediction → residual → GravityEngine weight update
//!
//! The safety contract throughout: a malfunctioning or extreme pillar/weight
//! state degrades to "no correction", never to a corrupted simulation.
//! ═══════════════════════════════════════════════════════════════════════════════

// ═══════════════════════════════════════════════════════════════════════════════
// FOUNDATION — errors, numeric primitives, configuration
// ═══════════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod stats;

// ═══════════════════════════════════════════════════════════════════════════════
// CORE — pillars, learned engine, orchestration
// ═══════════════════════════════════════════════════════════════════════════════

pub mod engine;
pub mod fabric;
pub mod pillar;
pub mod pillar_system;

// ═══════════════════════════════════════════════════════════════════════════════
// SURFACE — persistence, observability, shared-model batches
// ═══════════════════════════════════════════════════════════════════════════════

pub mod diagnostics;
pub mod shared;
pub mod snapshot;

// Re-export the public surface
pub use config::{
    AdaptiveGainConfig, FabricConfig, GainResponse, InteractionSpec, CONFIG_PATH_ENV,
};
pub use diagnostics::{FabricDiagnostics, WeightEntry};
pub use engine::{Correction, EngineHealth, EngineStats, GravityEngine};
pub use error::{ConfigError, GravityError, GravityResult, SnapshotError};
pub use fabric::{GravityFabric, StepSummary};
pub use pillar::{Pillar, PillarState};
pub use pillar_system::{PillarSystem, PillarUpdate, SystemView};
pub use shared::SharedGravityEngine;
pub use snapshot::{FabricSnapshot, SNAPSHOT_VERSION};
pub use stats::{float_cmp, Ewma, WindowedStats};
