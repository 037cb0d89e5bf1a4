//! ═══════════════════════════════════════════════════════════════════════════════
//! ENGINE — Correction Math, Online Learner, Safety Interlocks
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Per correction:
//!   gravity    = Σ_k w_k * basis[k]
//!   correction = clamp(λ_eff * gravity, ±max_correction)
//!
//! with three interlocks in front of the output:
//!   1. Circuit breaker — raw gravity hard-clamped at a threshold; each clamp
//!      counts as a trip
//!   2. Adaptive gain — λ_eff shrinks as the fragility estimate rises
//!      (weight RMS + correction volatility + recent trip rate)
//!   3. Magnitude cap — final correction clamped to ±max_correction
//!
//! Learning is SGD with momentum and L2 shrinkage over the same basis vector:
//!   v_k ← β v_k + η (residual * basis[k] − reg * w_k)
//!   w_k ← w_k + v_k
//!
//! Residuals are ground truth minus the PRE-correction prediction: the engine
//! learns the causal engine's raw error, and its own output never feeds back
//! into its learning target.
//!
//! The safety contract: nothing here ever returns NaN or inf. Any degenerate
//! term collapses to 0 and increments a diagnostic counter.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

use crate::config::{FabricConfig, GainResponse};
use crate::stats::{float_cmp, Ewma, WindowedStats};

/// Fragility blend weights: RMS term, volatility term, trip-rate term
const FRAGILITY_RMS_WEIGHT: f64 = 0.4;
const FRAGILITY_VOLATILITY_WEIGHT: f64 = 0.4;
const FRAGILITY_TRIP_WEIGHT: f64 = 0.2;

/// Result of a single correction computation
#[derive(Debug, Clone, Copy)]
pub struct Correction {
    /// Weighted basis combination before any interlock
    pub raw_gravity: f64,
    /// Gravity after the circuit breaker stage
    pub gravity: f64,
    /// Gain actually applied (λ, possibly fragility-scaled)
    pub lambda_effective: f64,
    /// Final clamped correction added to the prediction
    pub value: f64,
    /// Whether this computation tripped the circuit breaker
    pub tripped: bool,
}

impl Correction {
    /// A no-op correction (empty basis, degenerate input, disabled fabric)
    pub fn zero(lambda_effective: f64) -> Self {
        Self {
            raw_gravity: 0.0,
            gravity: 0.0,
            lambda_effective,
            value: 0.0,
            tripped: false,
        }
    }
}

/// Read-only engine diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub weight_count: usize,
    pub weight_rms: f64,
    pub trip_count: u64,
    pub fragility: f64,
    pub sample_count: u64,
    pub degeneracy_count: u64,
}

/// Coarse health classification thresholded on fragility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineHealth {
    /// Fragility below 0.3
    Nominal,
    /// Fragility in [0.3, 0.7)
    Cautious,
    /// Fragility at or above 0.7
    Fragile,
}

/// The learned model: per-pillar weights plus the safety bookkeeping
#[derive(Debug, Clone)]
pub struct GravityEngine {
    // Hyperparameters (validated at fabric construction)
    lambda: f64,
    eta: f64,
    beta: f64,
    regularization: f64,
    circuit_breaker_threshold: f64,
    max_correction: f64,
    weight_pruning_threshold: f64,
    max_weight: f64,
    adaptive_lambda: bool,
    weight_pruning: bool,
    gain_floor: f64,
    gain_sensitivity: f64,
    gain_response: GainResponse,
    rms_scale: f64,

    /// Learned weights; key set always identical to `momentum`
    weights: BTreeMap<String, f64>,
    /// Momentum accumulators, one per weight
    momentum: BTreeMap<String, f64>,

    /// Recent correction magnitudes (volatility source)
    magnitudes: WindowedStats,
    /// Trip flags for recent corrections (trip-rate source)
    recent_trips: VecDeque<bool>,
    /// Smoothed fragility so adaptive gain doesn't chatter
    fragility_smooth: Ewma,

    /// Contributions recorded at the most recent correction
    last_contributions: Vec<(String, f64)>,

    trip_count: u64,
    sample_count: u64,
    degeneracy_count: u64,
}

impl GravityEngine {
    /// Build from a validated config. Validation is the fabric's job;
    /// the engine trusts the values it is given.
    pub fn new(config: &FabricConfig) -> Self {
        Self {
            lambda: config.lambda,
            eta: config.learning_rate,
            beta: config.momentum,
            regularization: config.regularization,
            circuit_breaker_threshold: config.circuit_breaker_threshold,
            max_correction: config.max_correction,
            weight_pruning_threshold: config.weight_pruning_threshold,
            max_weight: config.max_weight,
            adaptive_lambda: config.enable_adaptive_lambda,
            weight_pruning: config.enable_weight_pruning,
            gain_floor: config.gain.floor,
            gain_sensitivity: config.gain.sensitivity,
            gain_response: config.gain.response,
            rms_scale: config.gain.rms_scale,
            weights: BTreeMap::new(),
            momentum: BTreeMap::new(),
            magnitudes: WindowedStats::new(config.volatility_window),
            recent_trips: VecDeque::with_capacity(config.volatility_window),
            fragility_smooth: Ewma::new(config.gain.smoothing_alpha),
            last_contributions: Vec::new(),
            trip_count: 0,
            sample_count: 0,
            degeneracy_count: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CORRECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Compute the correction for the given basis vector and record the
    /// per-correction bookkeeping (magnitude window, trip window,
    /// contribution attribution).
    pub fn compute_correction(&mut self, basis: &BTreeMap<String, f64>) -> Correction {
        self.last_contributions.clear();

        if basis.is_empty() {
            // Empty basis is not an error: no signal, no correction
            let correction = Correction::zero(self.effective_lambda());
            self.record_correction(&correction);
            return correction;
        }

        let mut raw_gravity = 0.0;
        for (name, intensity) in basis {
            let weight = self.weights.get(name).copied().unwrap_or(0.0);
            let term = weight * intensity;
            if !term.is_finite() {
                self.degeneracy_count += 1;
                warn!(pillar = %name, "non-finite gravity term dropped");
                continue;
            }
            raw_gravity += term;
            self.last_contributions.push((name.clone(), term));
        }

        if !raw_gravity.is_finite() {
            self.degeneracy_count += 1;
            let correction = Correction::zero(self.effective_lambda());
            self.record_correction(&correction);
            return correction;
        }

        // Circuit breaker: bound one pathological basis before the gain stage
        let (gravity, tripped) = if raw_gravity.abs() > self.circuit_breaker_threshold {
            self.trip_count += 1;
            debug!(
                raw_gravity,
                threshold = self.circuit_breaker_threshold,
                "circuit breaker tripped"
            );
            (
                raw_gravity.clamp(
                    -self.circuit_breaker_threshold,
                    self.circuit_breaker_threshold,
                ),
                true,
            )
        } else {
            (raw_gravity, false)
        };

        let lambda_effective = self.effective_lambda();
        let mut value =
            (lambda_effective * gravity).clamp(-self.max_correction, self.max_correction);
        if !value.is_finite() {
            self.degeneracy_count += 1;
            value = 0.0;
        }

        let correction = Correction {
            raw_gravity,
            gravity,
            lambda_effective,
            value,
            tripped,
        };
        self.record_correction(&correction);
        correction
    }

    /// Apply a correction to a predicted value, degrading to the input when
    /// the sum would be degenerate
    pub fn correct(&mut self, basis: &BTreeMap<String, f64>, predicted: f64) -> f64 {
        let correction = self.compute_correction(basis);
        let corrected = predicted + correction.value;
        if corrected.is_finite() {
            corrected
        } else {
            self.degeneracy_count += 1;
            predicted
        }
    }

    fn record_correction(&mut self, correction: &Correction) {
        self.magnitudes.push(correction.value.abs());
        if self.recent_trips.len() >= self.magnitudes.capacity() {
            self.recent_trips.pop_front();
        }
        self.recent_trips.push_back(correction.tripped);
        // Fold the post-correction fragility into the smoothed estimate
        let raw = self.raw_fragility();
        self.fragility_smooth.update(raw);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADAPTIVE GAIN
    // ═══════════════════════════════════════════════════════════════════════════

    /// λ as actually applied: fragility-scaled when adaptive gain is on
    pub fn effective_lambda(&self) -> f64 {
        if !self.adaptive_lambda {
            return self.lambda;
        }
        let fragility = self.fragility();
        let multiplier = match self.gain_response {
            GainResponse::Linear => (1.0 - self.gain_sensitivity * fragility).max(self.gain_floor),
            GainResponse::Exponential => {
                (-self.gain_sensitivity * fragility).exp().max(self.gain_floor)
            }
        };
        self.lambda * multiplier
    }

    /// Smoothed composite instability estimate in [0, 1]
    pub fn fragility(&self) -> f64 {
        if self.fragility_smooth.is_initialized() {
            self.fragility_smooth.value().clamp(0.0, 1.0)
        } else {
            self.raw_fragility()
        }
    }

    /// Unsmoothed fragility: weight RMS + correction volatility + trip rate.
    /// Every term degrades to 0 when its inputs are empty or degenerate.
    fn raw_fragility(&self) -> f64 {
        let rms = self.weight_rms();
        let rms_term = (rms / self.rms_scale).min(1.0);

        let volatility_term = self.magnitudes.std_dev().min(1.0);

        let trip_term = if self.recent_trips.is_empty() {
            0.0
        } else {
            self.recent_trips.iter().filter(|&&t| t).count() as f64
                / self.recent_trips.len() as f64
        };

        let fragility = FRAGILITY_RMS_WEIGHT * rms_term
            + FRAGILITY_VOLATILITY_WEIGHT * volatility_term
            + FRAGILITY_TRIP_WEIGHT * trip_term;

        if fragility.is_finite() {
            fragility.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Root-mean-square of current weights (0 when no weights held)
    pub fn weight_rms(&self) -> f64 {
        if self.weights.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.weights.values().map(|w| w * w).sum();
        (sum_sq / self.weights.len() as f64).sqrt()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LEARNING
    // ═══════════════════════════════════════════════════════════════════════════

    /// One SGD-with-momentum step over every pillar present in the basis.
    /// `residual` is ground truth minus the pre-correction prediction.
    /// Pillars absent from the basis are left untouched.
    pub fn update_weights(&mut self, residual: f64, basis: &BTreeMap<String, f64>) {
        if !residual.is_finite() {
            self.degeneracy_count += 1;
            warn!("non-finite residual dropped");
            return;
        }
        if basis.is_empty() {
            return;
        }

        for (name, intensity) in basis {
            if !intensity.is_finite() {
                self.degeneracy_count += 1;
                continue;
            }
            let weight = self.weights.entry(name.clone()).or_insert(0.0);
            let velocity = self.momentum.entry(name.clone()).or_insert(0.0);

            let gradient = residual * intensity - self.regularization * *weight;
            let mut new_velocity = self.beta * *velocity + self.eta * gradient;
            if !new_velocity.is_finite() {
                self.degeneracy_count += 1;
                new_velocity = 0.0;
            }
            let mut new_weight = *weight + new_velocity;
            if !new_weight.is_finite() {
                self.degeneracy_count += 1;
                new_weight = 0.0;
                new_velocity = 0.0;
            }

            *velocity = new_velocity;
            *weight = new_weight.clamp(-self.max_weight, self.max_weight);
        }

        self.sample_count += 1;

        if self.weight_pruning {
            self.prune_weights();
        }
    }

    /// Drop near-zero weights from both maps. Pruned signals simply restart
    /// at 0 if they reappear.
    fn prune_weights(&mut self) {
        let threshold = self.weight_pruning_threshold;
        let before = self.weights.len();
        self.weights.retain(|_, w| w.abs() >= threshold);
        let weights = &self.weights;
        self.momentum.retain(|name, _| weights.contains_key(name));
        let pruned = before - self.weights.len();
        if pruned > 0 {
            debug!(pruned, remaining = self.weights.len(), "weights pruned");
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pillars with the largest |w_k * basis_k| at the most recent correction
    pub fn top_contributors(&self, n: usize) -> Vec<(String, f64)> {
        let mut contributions = self.last_contributions.clone();
        contributions.sort_by(|a, b| float_cmp(&b.1.abs(), &a.1.abs()));
        contributions.truncate(n);
        contributions
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            weight_count: self.weights.len(),
            weight_rms: self.weight_rms(),
            trip_count: self.trip_count,
            fragility: self.fragility(),
            sample_count: self.sample_count,
            degeneracy_count: self.degeneracy_count,
        }
    }

    pub fn check_health(&self) -> EngineHealth {
        let fragility = self.fragility();
        if fragility < 0.3 {
            EngineHealth::Nominal
        } else if fragility < 0.7 {
            EngineHealth::Cautious
        } else {
            EngineHealth::Fragile
        }
    }

    pub fn weight(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn momentum(&self) -> &BTreeMap<String, f64> {
        &self.momentum
    }

    pub fn trip_count(&self) -> u64 {
        self.trip_count
    }

    pub fn degeneracy_count(&self) -> u64 {
        self.degeneracy_count
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PERSISTENCE SUPPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Restore learned state from persisted maps. Key sets are reconciled:
    /// momentum entries without a weight are dropped, weights without
    /// momentum get a zero accumulator; non-finite entries are discarded.
    pub fn restore(
        &mut self,
        weights: BTreeMap<String, f64>,
        momentum: BTreeMap<String, f64>,
        trip_count: u64,
        sample_count: u64,
        degeneracy_count: u64,
    ) {
        self.weights = weights
            .into_iter()
            .filter(|(_, w)| w.is_finite())
            .map(|(k, w)| (k, w.clamp(-self.max_weight, self.max_weight)))
            .collect();
        let keys: Vec<String> = self.weights.keys().cloned().collect();
        let mut restored_momentum = BTreeMap::new();
        for key in keys {
            let v = momentum.get(&key).copied().unwrap_or(0.0);
            restored_momentum.insert(key, if v.is_finite() { v } else { 0.0 });
        }
        self.momentum = restored_momentum;
        self.trip_count = trip_count;
        self.sample_count = sample_count;
        self.degeneracy_count = degeneracy_count;
        self.magnitudes.reset();
        self.recent_trips.clear();
        self.fragility_smooth.reset();
        self.last_contributions.clear();
    }
}
