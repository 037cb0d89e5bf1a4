//! ═══════════════════════════════════════════════════════════════════════════════
//! ERROR — Unified Error Type for the Gravity Fabric
//! ═══════════════════════════════════════════════════════════════════════════════
//! Centralized error handling. Numeric degeneracy (NaN/inf) is NOT an error —
//! it degrades to "no correction" and increments a diagnostic counter. Errors
//! here are construction-time config rejection and recoverable persistence
//! failures only.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::fmt;

/// The unified error type for the gravity-fabric crate
#[derive(Debug)]
pub enum GravityError {
    /// I/O error (snapshot/config file operations)
    Io(std::io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Configuration error (fatal at construction time)
    Config(ConfigError),
    /// Snapshot restore error
    Snapshot(SnapshotError),
}

impl std::error::Error for GravityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GravityError::Io(e) => Some(e),
            GravityError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for GravityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GravityError::Io(e) => write!(f, "I/O error: {}", e),
            GravityError::Json(e) => write!(f, "JSON error: {}", e),
            GravityError::Config(e) => write!(f, "Configuration error: {}", e),
            GravityError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
        }
    }
}

impl From<std::io::Error> for GravityError {
    fn from(err: std::io::Error) -> Self {
        GravityError::Io(err)
    }
}

impl From<serde_json::Error> for GravityError {
    fn from(err: serde_json::Error) -> Self {
        GravityError::Json(err)
    }
}

/// Configuration-specific errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// A hyperparameter is outside its valid range
    InvalidValue { field: String, message: String },
    /// Config file not found at the given path
    FileNotFound(String),
}

impl ConfigError {
    /// Shorthand for the common invalid-hyperparameter case
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for GravityError {
    fn from(err: ConfigError) -> Self {
        GravityError::Config(err)
    }
}

/// Snapshot-restore errors
#[derive(Debug, Clone)]
pub enum SnapshotError {
    /// Snapshot was written by an incompatible format version
    VersionMismatch { found: u32, supported: u32 },
    /// Snapshot content fails structural validation
    Corrupt(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::VersionMismatch { found, supported } => {
                write!(
                    f,
                    "Snapshot format version {} not supported (supported: {})",
                    found, supported
                )
            }
            SnapshotError::Corrupt(msg) => write!(f, "Corrupt snapshot: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<SnapshotError> for GravityError {
    fn from(err: SnapshotError) -> Self {
        GravityError::Snapshot(err)
    }
}

/// Type alias for Result with GravityError
pub type GravityResult<T> = Result<T, GravityError>;
