//! ═══════════════════════════════════════════════════════════════════════════════
//! PILLAR — A Single Named Latent Factor
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! A pillar is one symbolic state signal (hope, despair, rage, fatigue, …)
//! with a decaying intensity in [0, 1]. Intensity can be driven two ways:
//! - directly, via `set_intensity`
//! - from evidence, via `add_data_point`: intensity becomes the weighted
//!   mean of the currently held (value, weight) observations
//!
//! Every recorded intensity lands in a bounded history; velocity is always
//! the delta between the two most recent recordings.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default bound for history and the data-point window
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// How much of the history tail the diagnostic state carries
const STATE_HISTORY_TAIL: usize = 16;

/// A single named latent factor with decaying, weighted intensity
#[derive(Debug, Clone)]
pub struct Pillar {
    name: String,
    /// Current intensity, always finite and in [0, 1]
    intensity: f64,
    /// Delta between the two most recent recorded intensities
    velocity: f64,
    /// Recent recorded intensities, oldest evicted first
    history: VecDeque<f64>,
    /// Weighted observations backing evidence-driven intensity
    data_points: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl Pillar {
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create with an explicit history / data-point bound
    pub fn with_capacity(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            intensity: 0.0,
            velocity: 0.0,
            history: VecDeque::with_capacity(capacity.max(1)),
            data_points: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current intensity; the value the basis vector carries
    pub fn basis_value(&self) -> f64 {
        self.intensity
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// Push a weighted observation; intensity becomes the weighted mean of
    /// the held window. Negative weights clamp to 0 rather than erroring;
    /// a zero-weight point is accepted but contributes nothing. Non-finite
    /// inputs carry no information and are dropped.
    pub fn add_data_point(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || !weight.is_finite() {
            return;
        }
        let weight = weight.max(0.0);
        if self.data_points.len() >= self.capacity {
            self.data_points.pop_front();
        }
        self.data_points.push_back((value, weight));

        let total_weight: f64 = self.data_points.iter().map(|(_, w)| w).sum();
        if total_weight <= 0.0 {
            // All held points are weightless: no information, no change
            return;
        }
        let weighted_sum: f64 = self.data_points.iter().map(|(v, w)| v * w).sum();
        self.record((weighted_sum / total_weight).clamp(0.0, 1.0));
    }

    /// Directly overwrite intensity (clamped to [0, 1]).
    /// Non-finite values are dropped.
    pub fn set_intensity(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.record(value.clamp(0.0, 1.0));
    }

    /// Multiply intensity toward 0 by (1 - rate). Rate clamps to [0, 1].
    pub fn decay(&mut self, rate: f64) {
        if !rate.is_finite() {
            return;
        }
        let rate = rate.clamp(0.0, 1.0);
        self.record(self.intensity * (1.0 - rate));
    }

    /// Record a new intensity: history append, velocity recompute
    fn record(&mut self, new_intensity: f64) {
        let previous = self.intensity;
        self.intensity = new_intensity;
        self.velocity = new_intensity - previous;
        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(new_intensity);
    }

    /// Diagnostic serialization of this pillar's state
    pub fn state(&self) -> PillarState {
        PillarState {
            name: self.name.clone(),
            intensity: self.intensity,
            velocity: self.velocity,
            history_tail: self
                .history
                .iter()
                .rev()
                .take(STATE_HISTORY_TAIL)
                .rev()
                .copied()
                .collect(),
        }
    }
}

/// Serializable pillar snapshot for diagnostics and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarState {
    pub name: String,
    pub intensity: f64,
    pub velocity: f64,
    /// Most recent recorded intensities, oldest first
    pub history_tail: Vec<f64>,
}
