//! ═══════════════════════════════════════════════════════════════════════════════
//! CONFIG — Fabric Settings and Hyperparameters
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The full tunable surface of the fabric in one flat document:
//! learning hyperparameters, safety interlock thresholds, pillar dynamics,
//! and the interaction/opposition relations between pillars.
//!
//! Invalid configurations are rejected at fabric construction — a fabric is
//! never built with, say, a negative learning rate.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, GravityResult};

/// Environment variable naming an override path for the config file
pub const CONFIG_PATH_ENV: &str = "GRAVITY_FABRIC_CONFIG";

/// Main fabric configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Global correction gain λ
    pub lambda: f64,

    /// Learning rate η for the weight updates
    pub learning_rate: f64,

    /// Momentum coefficient β, in [0, 1)
    pub momentum: f64,

    /// L2 shrinkage strength applied during learning
    pub regularization: f64,

    /// Hard clamp on raw gravity magnitude; exceeding it trips the breaker
    pub circuit_breaker_threshold: f64,

    /// Hard cap on the final correction magnitude
    pub max_correction: f64,

    /// Weights with |w| below this are pruned after an update
    pub weight_pruning_threshold: f64,

    /// Hard clamp bound for learned weights
    pub max_weight: f64,

    /// Scale λ down as the fragility estimate rises
    pub enable_adaptive_lambda: bool,

    /// Prune near-zero weights after each update
    pub enable_weight_pruning: bool,

    /// Per-step intensity decay rate, in [0, 1]
    pub decay_rate: f64,

    /// Capacity of each pillar's intensity history and data-point window
    pub history_capacity: usize,

    /// Ring size for recent correction magnitudes and breaker trips
    pub volatility_window: usize,

    /// Directed pillar interactions, applied in listed order
    pub interactions: Vec<InteractionSpec>,

    /// Apply the reverse of each interaction edge as well
    pub symmetric_interactions: bool,

    /// Pillar pairs whose simultaneous activation counts as tension
    pub opposing: Vec<(String, String)>,

    /// Adaptive gain response shape
    pub gain: AdaptiveGainConfig,
}

/// One directed interaction edge: target is nudged by strength * source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSpec {
    pub source: String,
    pub target: String,
    pub strength: f64,
}

/// How fragility maps onto the effective gain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveGainConfig {
    /// Lower bound on the gain multiplier, in (0, 1]
    pub floor: f64,
    /// How aggressively fragility suppresses the gain
    pub sensitivity: f64,
    /// Functional shape of the suppression
    pub response: GainResponse,
    /// Weight RMS at which the RMS term of fragility saturates
    pub rms_scale: f64,
    /// EWMA alpha smoothing the fragility estimate between corrections
    pub smoothing_alpha: f64,
}

/// Shape of the fragility → gain-multiplier mapping.
/// Both shapes are monotone decreasing and bounded below by `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainResponse {
    /// multiplier = max(floor, 1 - sensitivity * fragility)
    Linear,
    /// multiplier = max(floor, exp(-sensitivity * fragility))
    Exponential,
}

impl Default for AdaptiveGainConfig {
    fn default() -> Self {
        Self {
            floor: 0.1,
            sensitivity: 1.0,
            response: GainResponse::Linear,
            rms_scale: 2.0,
            smoothing_alpha: 0.2,
        }
    }
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            learning_rate: 0.05,
            momentum: 0.9,
            regularization: 0.001,
            circuit_breaker_threshold: 5.0,
            max_correction: 2.0,
            weight_pruning_threshold: 1e-4,
            max_weight: 100.0,
            enable_adaptive_lambda: true,
            enable_weight_pruning: true,
            decay_rate: 0.05,
            history_capacity: 64,
            volatility_window: 32,
            interactions: Vec::new(),
            symmetric_interactions: false,
            opposing: Vec::new(),
            gain: AdaptiveGainConfig::default(),
        }
    }
}

impl FabricConfig {
    /// Validate every hyperparameter. Called at fabric construction;
    /// an invalid config is fatal there, never silently patched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn finite(field: &str, v: f64) -> Result<(), ConfigError> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, "must be finite"))
            }
        }

        finite("lambda", self.lambda)?;
        if self.lambda < 0.0 {
            return Err(ConfigError::invalid("lambda", "must be >= 0"));
        }

        finite("learning_rate", self.learning_rate)?;
        if self.learning_rate < 0.0 {
            return Err(ConfigError::invalid("learning_rate", "must be >= 0"));
        }

        finite("momentum", self.momentum)?;
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(ConfigError::invalid("momentum", "must be in [0, 1)"));
        }

        finite("regularization", self.regularization)?;
        if self.regularization < 0.0 {
            return Err(ConfigError::invalid("regularization", "must be >= 0"));
        }

        finite("circuit_breaker_threshold", self.circuit_breaker_threshold)?;
        if self.circuit_breaker_threshold <= 0.0 {
            return Err(ConfigError::invalid(
                "circuit_breaker_threshold",
                "must be > 0",
            ));
        }

        finite("max_correction", self.max_correction)?;
        if self.max_correction <= 0.0 {
            return Err(ConfigError::invalid("max_correction", "must be > 0"));
        }

        finite("weight_pruning_threshold", self.weight_pruning_threshold)?;
        if self.weight_pruning_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "weight_pruning_threshold",
                "must be >= 0",
            ));
        }

        finite("max_weight", self.max_weight)?;
        if self.max_weight <= 0.0 {
            return Err(ConfigError::invalid("max_weight", "must be > 0"));
        }

        finite("decay_rate", self.decay_rate)?;
        if !(0.0..=1.0).contains(&self.decay_rate) {
            return Err(ConfigError::invalid("decay_rate", "must be in [0, 1]"));
        }

        if self.history_capacity == 0 {
            return Err(ConfigError::invalid("history_capacity", "must be > 0"));
        }
        if self.volatility_window == 0 {
            return Err(ConfigError::invalid("volatility_window", "must be > 0"));
        }

        finite("gain.floor", self.gain.floor)?;
        if !(self.gain.floor > 0.0 && self.gain.floor <= 1.0) {
            return Err(ConfigError::invalid("gain.floor", "must be in (0, 1]"));
        }
        finite("gain.sensitivity", self.gain.sensitivity)?;
        if self.gain.sensitivity < 0.0 {
            return Err(ConfigError::invalid("gain.sensitivity", "must be >= 0"));
        }
        finite("gain.rms_scale", self.gain.rms_scale)?;
        if self.gain.rms_scale <= 0.0 {
            return Err(ConfigError::invalid("gain.rms_scale", "must be > 0"));
        }
        finite("gain.smoothing_alpha", self.gain.smoothing_alpha)?;
        if !(self.gain.smoothing_alpha > 0.0 && self.gain.smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid(
                "gain.smoothing_alpha",
                "must be in (0, 1]",
            ));
        }

        for (i, spec) in self.interactions.iter().enumerate() {
            if !spec.strength.is_finite() {
                return Err(ConfigError::invalid(
                    "interactions",
                    format!("entry {} has non-finite strength", i),
                ));
            }
            if spec.source.is_empty() || spec.target.is_empty() {
                return Err(ConfigError::invalid(
                    "interactions",
                    format!("entry {} has an empty pillar name", i),
                ));
            }
        }

        Ok(())
    }

    /// Load config from a JSON file
    pub fn from_file(path: &Path) -> GravityResult<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: FabricConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a JSON file
    pub fn save_to(&self, path: &Path) -> GravityResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load config: defaults, overridden by the file at `GRAVITY_FABRIC_CONFIG`
    /// if that variable is set. With no override, defaults are returned as-is.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let config = Self::from_file(&PathBuf::from(&path))?;
                Ok(config)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FabricConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_learning_rate_rejected() {
        let config = FabricConfig {
            learning_rate: -0.1,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("learning_rate"));
    }

    #[test]
    fn test_momentum_one_rejected() {
        let config = FabricConfig {
            momentum: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_lambda_rejected() {
        let config = FabricConfig {
            lambda: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_interaction_rejected() {
        let config = FabricConfig {
            interactions: vec![InteractionSpec {
                source: "hope".to_string(),
                target: "despair".to_string(),
                strength: f64::INFINITY,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_json() {
        let config = FabricConfig {
            interactions: vec![InteractionSpec {
                source: "hope".to_string(),
                target: "despair".to_string(),
                strength: -0.2,
            }],
            opposing: vec![("hope".to_string(), "despair".to_string())],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: FabricConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.interactions.len(), 1);
        assert_eq!(back.opposing.len(), 1);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        // Flat key-value document with only a few keys set
        let back: FabricConfig = serde_json::from_str(r#"{"lambda": 0.5}"#).unwrap();
        assert_eq!(back.lambda, 0.5);
        assert_eq!(back.momentum, FabricConfig::default().momentum);
    }
}
