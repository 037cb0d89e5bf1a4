//! ═══════════════════════════════════════════════════════════════════════════════
//! PILLAR SYSTEM — Registry, Per-Turn Dynamics, Basis Vector
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Owns every pillar exclusively and advances them once per simulation turn:
//! decay all registered pillars, fold in external signals (auto-registering
//! unseen names), then apply the configured pairwise interactions in listed
//! order. The basis vector it exposes is the sole interface the gravity
//! engine consumes.
//!
//! Pillars live in a BTreeMap: sorted iteration keeps every downstream
//! floating-point reduction bit-identical across runs.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::InteractionSpec;
use crate::pillar::{Pillar, PillarState};
use crate::stats::float_cmp;

/// How `update_pillar` drives the named pillar
#[derive(Debug, Clone, Copy)]
pub enum PillarUpdate {
    /// Overwrite intensity directly
    Set(f64),
    /// Push a weighted observation
    DataPoint { value: f64, weight: f64 },
}

/// One directed interaction: target nudged by strength * source intensity
#[derive(Debug, Clone)]
struct Interaction {
    source: String,
    target: String,
    strength: f64,
}

/// Owns the pillar collection and its per-turn dynamics
#[derive(Debug, Clone)]
pub struct PillarSystem {
    pillars: BTreeMap<String, Pillar>,
    /// Applied in insertion order; the explicit tie-break for determinism
    interactions: Vec<Interaction>,
    symmetric_interactions: bool,
    /// Pairs whose simultaneous activation counts as tension
    opposing: Vec<(String, String)>,
    history_capacity: usize,
}

impl PillarSystem {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pillars: BTreeMap::new(),
            interactions: Vec::new(),
            symmetric_interactions: false,
            opposing: Vec::new(),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Build from configured relations
    pub fn with_relations(
        history_capacity: usize,
        interactions: &[InteractionSpec],
        symmetric: bool,
        opposing: &[(String, String)],
    ) -> Self {
        let mut system = Self::new(history_capacity);
        system.symmetric_interactions = symmetric;
        for spec in interactions {
            system.add_interaction(&spec.source, &spec.target, spec.strength);
        }
        system.opposing = opposing.to_vec();
        system
    }

    /// Register a pillar; idempotent — an existing name is left untouched
    pub fn register_pillar(&mut self, name: &str, initial_intensity: f64) -> &mut Pillar {
        let capacity = self.history_capacity;
        self.pillars.entry(name.to_string()).or_insert_with(|| {
            let mut pillar = Pillar::with_capacity(name, capacity);
            if initial_intensity != 0.0 {
                pillar.set_intensity(initial_intensity);
            }
            pillar
        })
    }

    /// Append a directed interaction edge
    pub fn add_interaction(&mut self, source: &str, target: &str, strength: f64) {
        if !strength.is_finite() {
            return;
        }
        self.interactions.push(Interaction {
            source: source.to_string(),
            target: target.to_string(),
            strength,
        });
    }

    /// Declare a pair of pillars as opposing (for the tension score)
    pub fn add_opposition(&mut self, a: &str, b: &str) {
        self.opposing.push((a.to_string(), b.to_string()));
    }

    /// Drive the named pillar, auto-registering it if unseen
    pub fn update_pillar(&mut self, name: &str, update: PillarUpdate) {
        let pillar = self.register_pillar(name, 0.0);
        match update {
            PillarUpdate::Set(value) => pillar.set_intensity(value),
            PillarUpdate::DataPoint { value, weight } => pillar.add_data_point(value, weight),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pillars.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Pillar> {
        self.pillars.get(name)
    }

    pub fn len(&self) -> usize {
        self.pillars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }

    /// Advance one simulation turn: decay, signals, interactions
    pub fn step(&mut self, external_signals: &HashMap<String, f64>, decay_rate: f64) {
        for pillar in self.pillars.values_mut() {
            pillar.decay(decay_rate);
        }

        // Per-pillar signal application is order-independent (one signal per
        // name), so the caller's map type doesn't threaten determinism.
        for (name, value) in external_signals {
            self.update_pillar(name, PillarUpdate::Set(*value));
        }

        self.apply_interactions();
    }

    /// Apply configured interactions in insertion order. Both endpoints are
    /// registered first so the interaction relation never references a
    /// missing pillar.
    fn apply_interactions(&mut self) {
        let edges = self.interactions.clone();
        for edge in &edges {
            self.register_pillar(&edge.source, 0.0);
            self.register_pillar(&edge.target, 0.0);
            self.apply_edge(&edge.source, &edge.target, edge.strength);
            if self.symmetric_interactions {
                self.apply_edge(&edge.target, &edge.source, edge.strength);
            }
        }
    }

    fn apply_edge(&mut self, source: &str, target: &str, strength: f64) {
        let push = match self.pillars.get(source) {
            Some(p) => strength * p.basis_value(),
            None => return,
        };
        if let Some(target) = self.pillars.get_mut(target) {
            let nudged = target.basis_value() + push;
            target.set_intensity(nudged.clamp(0.0, 1.0));
        }
    }

    /// Name → intensity for every registered pillar
    pub fn basis_vector(&self) -> BTreeMap<String, f64> {
        self.pillars
            .iter()
            .map(|(name, p)| (name.clone(), p.basis_value()))
            .collect()
    }

    /// Sum of all intensities
    pub fn basis_support(&self) -> f64 {
        self.pillars.values().map(|p| p.basis_value()).sum()
    }

    /// How much configured opposing pairs are simultaneously active:
    /// sum over pairs of min(a, b) intensity
    pub fn tension_score(&self) -> f64 {
        self.opposing
            .iter()
            .map(|(a, b)| {
                let ia = self.pillars.get(a).map_or(0.0, |p| p.basis_value());
                let ib = self.pillars.get(b).map_or(0.0, |p| p.basis_value());
                ia.min(ib)
            })
            .sum()
    }

    /// Full diagnostic dump of all pillars plus the top-N dominant ones
    pub fn visualization_data(&self, top_n: usize) -> SystemView {
        let pillars: Vec<PillarState> = self.pillars.values().map(|p| p.state()).collect();

        let mut by_intensity: Vec<(String, f64)> = self
            .pillars
            .iter()
            .map(|(name, p)| (name.clone(), p.basis_value()))
            .collect();
        by_intensity.sort_by(|a, b| float_cmp(&b.1, &a.1));
        by_intensity.truncate(top_n);

        SystemView {
            pillars,
            dominant: by_intensity,
            basis_support: self.basis_support(),
            tension: self.tension_score(),
        }
    }
}

/// Diagnostic view of the whole pillar system
#[derive(Debug, Clone, Serialize)]
pub struct SystemView {
    pub pillars: Vec<PillarState>,
    /// Top-N pillars by intensity, descending
    pub dominant: Vec<(String, f64)>,
    pub basis_support: f64,
    pub tension: f64,
}
