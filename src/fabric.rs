//! ═══════════════════════════════════════════════════════════════════════════════
//! FABRIC — Orchestration of Pillars, Engine, and the Turn Cycle
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The fabric couples the pillar system and the gravity engine to the
//! surrounding simulation. One turn is:
//!
//!   step(signals)            advance pillar dynamics, capture the basis
//!   apply_correction(...)    correct eligible variables from that basis
//!   update_weights(...)      learn from residuals against the SAME basis
//!
//! The basis vector is captured exactly once per step. Every correction and
//! learning call in the turn reads that capture, so a residual is always
//! attributed to the basis that produced its correction, even when several
//! variables are corrected in sequence.
//!
//! The fabric owns its parts outright and never touches simulation state:
//! corrected values are returned to the caller, who writes them back.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::config::FabricConfig;
use crate::engine::{EngineHealth, GravityEngine};
use crate::error::GravityResult;
use crate::pillar_system::{PillarSystem, SystemView};

/// Summary of one pillar-system advance
#[derive(Debug, Clone, Copy)]
pub struct StepSummary {
    /// Turn counter after this step
    pub turn: u64,
    pub pillar_count: usize,
    /// Sum of all pillar intensities
    pub basis_support: f64,
    /// Opposing-pair co-activation score
    pub tension: f64,
}

/// Orchestrates one simulation timeline's correction layer
#[derive(Debug, Clone)]
pub struct GravityFabric {
    config: FabricConfig,
    pillars: PillarSystem,
    engine: GravityEngine,
    /// Variables eligible for correction
    variables: BTreeSet<String>,
    /// Basis vector captured at the most recent step
    captured_basis: BTreeMap<String, f64>,
    /// When false, corrections pass through and learning is ignored;
    /// pillars still advance. Used for causal-only baseline runs.
    enabled: bool,
    turn_count: u64,
    /// Corrections requested for unregistered variables
    unknown_variable_count: u64,
}

impl GravityFabric {
    /// Construct from config. Fails on an invalid configuration — a fabric
    /// is never built around bad hyperparameters.
    pub fn new(config: FabricConfig) -> GravityResult<Self> {
        config.validate()?;
        let pillars = PillarSystem::with_relations(
            config.history_capacity,
            &config.interactions,
            config.symmetric_interactions,
            &config.opposing,
        );
        let engine = GravityEngine::new(&config);
        Ok(Self {
            config,
            pillars,
            engine,
            variables: BTreeSet::new(),
            captured_basis: BTreeMap::new(),
            enabled: true,
            turn_count: 0,
            unknown_variable_count: 0,
        })
    }

    /// Explicit factory with default configuration. The caller owns the
    /// instance; there is no process-wide default fabric.
    pub fn with_defaults() -> Self {
        Self::new(FabricConfig::default()).expect("default config is valid")
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VARIABLE ELIGIBILITY
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn register_variable(&mut self, name: &str) {
        self.variables.insert(name.to_string());
    }

    pub fn unregister_variable(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    pub fn registered_variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|s| s.as_str())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TURN CYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance the pillar system one simulation turn and capture the basis
    /// vector all corrections and learning in this turn will read.
    pub fn step(&mut self, external_signals: &HashMap<String, f64>) -> StepSummary {
        self.pillars.step(external_signals, self.config.decay_rate);
        self.captured_basis = self.pillars.basis_vector();
        self.turn_count += 1;
        StepSummary {
            turn: self.turn_count,
            pillar_count: self.pillars.len(),
            basis_support: self.pillars.basis_support(),
            tension: self.pillars.tension_score(),
        }
    }

    /// Correct one variable's predicted value. Unregistered variables (and a
    /// disabled fabric) pass the input through unchanged.
    pub fn apply_correction(&mut self, variable: &str, predicted: f64) -> f64 {
        if !self.enabled {
            return predicted;
        }
        if !self.variables.contains(variable) {
            self.unknown_variable_count += 1;
            debug!(variable, "correction requested for unregistered variable");
            return predicted;
        }
        self.engine.correct(&self.captured_basis, predicted)
    }

    /// Correct every registered variable present in the input; everything
    /// else passes through unchanged. Variables are processed in sorted
    /// order — correction bookkeeping is sequence-dependent, and the result
    /// must not depend on the caller's map ordering.
    pub fn bulk_apply_correction(
        &mut self,
        predictions: &HashMap<String, f64>,
    ) -> HashMap<String, f64> {
        let mut ordered: Vec<(&String, &f64)> = predictions.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));
        ordered
            .into_iter()
            .map(|(name, value)| {
                let corrected = if self.enabled && self.variables.contains(name) {
                    self.engine.correct(&self.captured_basis, *value)
                } else {
                    *value
                };
                (name.clone(), corrected)
            })
            .collect()
    }

    /// Learn from residuals (ground truth minus pre-correction prediction),
    /// one engine update per registered variable, all against the captured
    /// basis. Residuals for unknown variables are ignored.
    pub fn update_weights(&mut self, residuals: &HashMap<String, f64>) {
        if !self.enabled {
            return;
        }
        // Sorted iteration: the weight trajectory must not depend on the
        // caller's map ordering.
        let mut ordered: Vec<(&String, &f64)> = residuals.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));
        for (variable, residual) in ordered {
            if !self.variables.contains(variable) {
                self.unknown_variable_count += 1;
                continue;
            }
            self.engine.update_weights(*residual, &self.captured_basis);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTROL & INTROSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Enable or disable correction for this instance. Weights and pillars
    /// are left intact either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    pub fn unknown_variable_count(&self) -> u64 {
        self.unknown_variable_count
    }

    /// The basis vector captured at the most recent step
    pub fn captured_basis(&self) -> &BTreeMap<String, f64> {
        &self.captured_basis
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    pub fn pillars(&self) -> &PillarSystem {
        &self.pillars
    }

    pub fn pillars_mut(&mut self) -> &mut PillarSystem {
        &mut self.pillars
    }

    pub fn engine(&self) -> &GravityEngine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut GravityEngine {
        &mut self.engine
    }

    pub fn health(&self) -> EngineHealth {
        self.engine.check_health()
    }

    /// Full pillar-system dump for visualization
    pub fn visualization_data(&self, top_n: usize) -> SystemView {
        self.pillars.visualization_data(top_n)
    }

    pub(crate) fn variables_set(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub(crate) fn restore_variables(&mut self, variables: BTreeSet<String>, enabled: bool) {
        self.variables = variables;
        self.enabled = enabled;
    }

    pub(crate) fn refresh_captured_basis(&mut self) {
        self.captured_basis = self.pillars.basis_vector();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pillar_system::PillarUpdate;

    fn signals(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn fabric() -> GravityFabric {
        let config = FabricConfig {
            lambda: 1.0,
            learning_rate: 0.1,
            momentum: 0.0,
            regularization: 0.0,
            decay_rate: 0.1,
            enable_adaptive_lambda: false,
            enable_weight_pruning: false,
            ..Default::default()
        };
        GravityFabric::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = FabricConfig {
            learning_rate: -1.0,
            ..Default::default()
        };
        assert!(GravityFabric::new(config).is_err());
    }

    #[test]
    fn test_unregistered_variable_passthrough() {
        let mut fabric = fabric();
        fabric.step(&signals(&[("hope", 0.8)]));
        assert_eq!(fabric.apply_correction("price", 100.0), 100.0);
        assert_eq!(fabric.unknown_variable_count(), 1);
    }

    #[test]
    fn test_zero_signal_idempotence() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.step(&HashMap::new());
        assert!(fabric.captured_basis().is_empty());
        assert_eq!(fabric.apply_correction("price", 100.0), 100.0);
    }

    #[test]
    fn test_correction_before_first_step_passthrough() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        assert_eq!(fabric.apply_correction("price", 7.5), 7.5);
    }

    #[test]
    fn test_turn_cycle_end_to_end() {
        let mut fabric = fabric();
        fabric.register_variable("price");

        let summary = fabric.step(&signals(&[("hope", 0.8)]));
        assert_eq!(summary.turn, 1);
        assert_eq!(summary.pillar_count, 1);
        assert!((summary.basis_support - 0.8).abs() < 1e-12);

        // Weight starts at 0: no correction
        assert_eq!(fabric.apply_correction("price", 100.0), 100.0);

        // Learn from residual +5.0 → weight 0.4
        fabric.update_weights(&signals(&[("price", 5.0)]));
        assert!((fabric.engine().weight("hope").unwrap() - 0.4).abs() < 1e-12);

        // Same captured basis: gravity = 0.32
        let corrected = fabric.apply_correction("price", 100.0);
        assert!((corrected - 100.32).abs() < 1e-12);
    }

    #[test]
    fn test_basis_captured_per_step_not_per_call() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.step(&signals(&[("hope", 0.8)]));
        fabric.update_weights(&signals(&[("price", 5.0)]));

        // Mutating pillars mid-turn must not affect this turn's corrections
        fabric
            .pillars_mut()
            .update_pillar("hope", PillarUpdate::Set(0.1));
        let corrected = fabric.apply_correction("price", 100.0);
        assert!((corrected - 100.32).abs() < 1e-12);

        // The next step picks up the mutated intensity (0.1 then decayed)
        fabric.step(&HashMap::new());
        let basis = fabric.captured_basis();
        assert!((basis["hope"] - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_bulk_correction_passthrough_mix() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.step(&signals(&[("hope", 1.0)]));
        fabric.update_weights(&signals(&[("price", 1.0)]));

        let out = fabric.bulk_apply_correction(&signals(&[("price", 10.0), ("volume", 3.0)]));
        assert!((out["price"] - 10.1).abs() < 1e-12); // w=0.1, basis 1.0
        assert_eq!(out["volume"], 3.0); // unregistered: untouched
    }

    #[test]
    fn test_residuals_for_unknown_variables_ignored() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.step(&signals(&[("hope", 1.0)]));
        fabric.update_weights(&signals(&[("volume", 99.0)]));
        assert!(fabric.engine().weight("hope").is_none());
        assert_eq!(fabric.unknown_variable_count(), 1);
    }

    #[test]
    fn test_disable_flag_bypasses_correction_and_learning() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.step(&signals(&[("hope", 1.0)]));
        fabric.update_weights(&signals(&[("price", 5.0)]));
        let weight_before = fabric.engine().weight("hope").unwrap();

        fabric.set_enabled(false);
        assert_eq!(fabric.apply_correction("price", 100.0), 100.0);
        fabric.update_weights(&signals(&[("price", 50.0)]));
        assert_eq!(fabric.engine().weight("hope").unwrap(), weight_before);

        // Pillars still advance while disabled
        fabric.step(&HashMap::new());
        assert_eq!(fabric.turn_count(), 2);

        // Re-enabling picks the weights back up
        fabric.set_enabled(true);
        assert!(fabric.apply_correction("price", 100.0) > 100.0);
    }

    #[test]
    fn test_unregister_variable() {
        let mut fabric = fabric();
        fabric.register_variable("price");
        fabric.unregister_variable("price");
        fabric.step(&signals(&[("hope", 1.0)]));
        fabric.update_weights(&signals(&[("price", 5.0)]));
        assert!(fabric.engine().weight("hope").is_none());
    }

    #[test]
    fn test_with_defaults_factory() {
        let fabric = GravityFabric::with_defaults();
        assert!(fabric.is_enabled());
        assert_eq!(fabric.turn_count(), 0);
    }
}
