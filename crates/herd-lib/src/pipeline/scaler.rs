//! Standardization of numeric columns

use serde::{Deserialize, Serialize};

/// Single-pass mean and variance accumulator
///
/// Uses Welford's online algorithm for numerical stability.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation (divides by n)
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).max(0.0).sqrt()
    }

    pub fn finish(&self) -> ColumnScale {
        ColumnScale {
            mean: self.mean,
            std_dev: self.std_dev(),
        }
    }
}

/// Fitted mean and standard deviation of one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnScale {
    /// z-score of `value`; a constant column maps everything to zero
    pub fn scale(&self, value: f64) -> f64 {
        if self.std_dev < f64::EPSILON {
            0.0
        } else {
            (value - self.mean) / self.std_dev
        }
    }
}
