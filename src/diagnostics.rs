//! ═══════════════════════════════════════════════════════════════════════════════
//! DIAGNOSTICS — Serializable Observability Export
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Answers: "What is the fabric doing, right now?"
//!
//! A read-only aggregate of pillar states, learned weights, interlock
//! counters, and the fragility estimate — the data contract consumed by
//! external visualization and reporting. Capturing one has no effect on
//! correction or learning.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{EngineHealth, EngineStats};
use crate::fabric::GravityFabric;
use crate::pillar::PillarState;

/// How many dominant pillars the export carries
const DOMINANT_PILLARS: usize = 5;

/// One learned weight with its momentum accumulator
#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub name: String,
    pub weight: f64,
    pub momentum: f64,
}

/// Complete fabric diagnostics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct FabricDiagnostics {
    pub captured_at: DateTime<Utc>,
    pub turn_count: u64,
    pub enabled: bool,

    /// Per-pillar state: name, intensity, velocity, history tail
    pub pillars: Vec<PillarState>,
    /// Top pillars by intensity, descending
    pub dominant_pillars: Vec<(String, f64)>,
    pub basis_support: f64,
    pub tension: f64,

    /// Per-weight entries, sorted by name
    pub weights: Vec<WeightEntry>,
    pub engine: EngineStats,
    pub health: EngineHealth,
    pub lambda_effective: f64,

    pub registered_variables: Vec<String>,
    pub unknown_variable_count: u64,
}

impl FabricDiagnostics {
    /// Capture the current diagnostic view of a fabric
    pub fn capture(fabric: &GravityFabric) -> Self {
        let view = fabric.visualization_data(DOMINANT_PILLARS);
        let engine = fabric.engine();
        let weights = engine
            .weights()
            .iter()
            .map(|(name, weight)| WeightEntry {
                name: name.clone(),
                weight: *weight,
                momentum: engine.momentum().get(name).copied().unwrap_or(0.0),
            })
            .collect();

        Self {
            captured_at: Utc::now(),
            turn_count: fabric.turn_count(),
            enabled: fabric.is_enabled(),
            pillars: view.pillars,
            dominant_pillars: view.dominant,
            basis_support: view.basis_support,
            tension: view.tension,
            weights,
            engine: engine.stats(),
            health: engine.check_health(),
            lambda_effective: engine.effective_lambda(),
            registered_variables: fabric.registered_variables().map(String::from).collect(),
            unknown_variable_count: fabric.unknown_variable_count(),
        }
    }
}

impl GravityFabric {
    /// Aggregate diagnostics for external visualization/reporting
    pub fn diagnostics(&self) -> FabricDiagnostics {
        FabricDiagnostics::capture(self)
    }
}
