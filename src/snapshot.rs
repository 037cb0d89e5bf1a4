//! ═══════════════════════════════════════════════════════════════════════════════
//! SNAPSHOT — Persistence of Learned State
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! A fabric resumes learning across process restarts from a flat JSON
//! document: pillar intensities, weight and momentum maps, and the
//! diagnostic counters. Rolling windows (correction magnitudes, trip flags)
//! are transient and restart empty — fragility re-estimates from live
//! corrections within one window.
//!
//! Load failures are recoverable: the caller keeps its in-memory state (or
//! defaults) and continues.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

use crate::error::{GravityResult, SnapshotError};
use crate::fabric::GravityFabric;
use crate::pillar_system::PillarUpdate;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Guard against pathological snapshot files (16 MB is far beyond any
/// realistic pillar/weight population)
const MAX_SNAPSHOT_SIZE: usize = 16 * 1024 * 1024;

/// Serializable fabric state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Pillar name → intensity at save time
    pub pillar_intensities: BTreeMap<String, f64>,
    /// Learned weights
    pub weights: BTreeMap<String, f64>,
    /// Momentum accumulators
    pub momentum: BTreeMap<String, f64>,
    /// Variables eligible for correction
    pub variables: BTreeSet<String>,
    pub enabled: bool,
    pub turn_count: u64,
    pub trip_count: u64,
    pub sample_count: u64,
    pub degeneracy_count: u64,
}

impl FabricSnapshot {
    /// Capture the persistable state of a fabric
    pub fn capture(fabric: &GravityFabric) -> Self {
        let stats = fabric.engine().stats();
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            pillar_intensities: fabric.pillars().basis_vector(),
            weights: fabric.engine().weights().clone(),
            momentum: fabric.engine().momentum().clone(),
            variables: fabric.variables_set().clone(),
            enabled: fabric.is_enabled(),
            turn_count: fabric.turn_count(),
            trip_count: stats.trip_count,
            sample_count: stats.sample_count,
            degeneracy_count: stats.degeneracy_count,
        }
    }

    /// Structural validation before a restore is attempted
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        for (name, intensity) in &self.pillar_intensities {
            if !intensity.is_finite() {
                return Err(SnapshotError::Corrupt(format!(
                    "pillar '{}' has non-finite intensity",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Write to a JSON file
    pub fn save_to(&self, path: &Path) -> GravityResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Read from a JSON file
    pub fn load_from(path: &Path) -> GravityResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        if contents.len() > MAX_SNAPSHOT_SIZE {
            return Err(SnapshotError::Corrupt(format!(
                "snapshot file too large: {} bytes",
                contents.len()
            ))
            .into());
        }
        let snapshot: FabricSnapshot = serde_json::from_str(&contents)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl GravityFabric {
    /// Capture a persistable snapshot of this fabric
    pub fn snapshot(&self) -> FabricSnapshot {
        FabricSnapshot::capture(self)
    }

    /// Restore learned state from a snapshot. The fabric's configuration is
    /// not part of the snapshot — hyperparameters come from construction.
    pub fn restore(&mut self, snapshot: &FabricSnapshot) -> GravityResult<()> {
        snapshot.validate()?;

        for (name, intensity) in &snapshot.pillar_intensities {
            self.pillars_mut()
                .update_pillar(name, PillarUpdate::Set(*intensity));
        }
        self.engine_mut().restore(
            snapshot.weights.clone(),
            snapshot.momentum.clone(),
            snapshot.trip_count,
            snapshot.sample_count,
            snapshot.degeneracy_count,
        );
        self.restore_variables(snapshot.variables.clone(), snapshot.enabled);
        self.refresh_captured_basis();
        Ok(())
    }

    /// Persist to a JSON file
    pub fn save_to(&self, path: &Path) -> GravityResult<()> {
        self.snapshot().save_to(path)
    }

    /// Restore from a JSON file. On failure the fabric is untouched and the
    /// error is returned for the caller to log and ignore.
    pub fn load_from(&mut self, path: &Path) -> GravityResult<()> {
        let snapshot = match FabricSnapshot::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot load failed");
                return Err(e);
            }
        };
        self.restore(&snapshot)
    }
}
