//! ═══════════════════════════════════════════════════════════════════════════════
//! STATS — Numeric Primitives for the Fragility Estimator
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Building blocks consumed by the gravity engine:
//! - EWMA for smoothing the fragility estimate between turns
//! - Windowed mean/variance over a bounded ring of recent correction magnitudes
//!
//! A windowed estimator (rather than a cumulative one) is deliberate: the
//! fragility signal must forget corrections that scrolled out of the recent
//! past, otherwise one early spike suppresses the gain forever.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::cmp::Ordering;
use std::collections::VecDeque;

// ═══════════════════════════════════════════════════════════════════════════════
// EWMA — Exponentially Weighted Moving Average
// ═══════════════════════════════════════════════════════════════════════════════

/// Exponentially weighted moving average.
/// New sample weighted by α, history by (1-α); first sample initializes.
#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f64,
    value: f64,
    initialized: bool,
}

impl Ewma {
    /// Create a new EWMA. Alpha must be in (0, 1].
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self {
            alpha,
            value: 0.0,
            initialized: false,
        }
    }

    /// Fold in a new sample
    pub fn update(&mut self, sample: f64) {
        if !self.initialized {
            self.value = sample;
            self.initialized = true;
        } else {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        }
    }

    /// Current smoothed value (0.0 before the first sample)
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Reset to the uninitialized state
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.initialized = false;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WINDOWED STATS — Mean/variance over a bounded ring of samples
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-capacity ring of samples with mean/variance over the window.
/// Oldest sample evicted first. Non-finite samples are rejected at `push`.
#[derive(Debug, Clone)]
pub struct WindowedStats {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl WindowedStats {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window capacity must be > 0");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest if full.
    /// Returns false (and records nothing) for non-finite samples.
    pub fn push(&mut self, sample: f64) -> bool {
        if !sample.is_finite() {
            return false;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean over the window (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population variance over the window (0.0 with fewer than 2 samples)
    pub fn variance(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        self.samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64
    }

    /// Standard deviation over the window
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLOAT ORDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Total-order comparator for f64 sorting; NaN sorts last
pub fn float_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or_else(|| {
        if a.is_nan() && b.is_nan() {
            Ordering::Equal
        } else if a.is_nan() {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    })
}
