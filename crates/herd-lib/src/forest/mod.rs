//! Bagged decision-tree ensembles
//!
//! Both models share one CART implementation ([`tree`]) that is generic
//! over the split criterion: variance reduction for yield regression and
//! Gini impurity for disease classification. Each tree is grown on a
//! bootstrap sample with a random feature subset evaluated at every split.
//!
//! Trees are fitted in parallel. Every tree derives its own RNG from the
//! forest seed and its index, so the fitted forest does not depend on
//! thread scheduling.

mod classifier;
mod regressor;
mod tree;

pub use classifier::{ClassPrediction, RandomForestClassifier};
pub use regressor::RandomForestRegressor;

use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Default number of trees per forest
pub const DEFAULT_N_TREES: usize = 100;

/// Default forest seed
pub const DEFAULT_SEED: u64 = 42;

/// Number of features evaluated at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    /// Fraction of the feature count, in (0, 1]
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).round() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyper-parameters shared by both ensembles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
    pub max_features: MaxFeatures,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl ForestConfig {
    /// Defaults for the yield regressor
    pub fn regression() -> Self {
        Self {
            max_features: MaxFeatures::Fraction(1.0 / 3.0),
            ..Self::base()
        }
    }

    /// Defaults for the disease classifier
    pub fn classification() -> Self {
        Self {
            max_features: MaxFeatures::Sqrt,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            seed: DEFAULT_SEED,
            max_features: MaxFeatures::All,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_trees == 0 {
            return Err(ModelError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidConfig(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidConfig(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(ModelError::InvalidConfig(format!(
                    "max_features fraction {} is outside (0, 1]",
                    f
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn tree_rng(&self, tree_index: usize) -> StdRng {
        let mixed = (tree_index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        StdRng::seed_from_u64(self.seed ^ mixed)
    }
}

/// Dense row-major matrix of transformed features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    n_rows: usize,
    n_features: usize,
}

impl FeatureMatrix {
    pub fn with_capacity(n_features: usize, rows: usize) -> Self {
        Self {
            values: Vec::with_capacity(n_features * rows),
            n_rows: 0,
            n_features,
        }
    }

    pub fn from_rows(n_features: usize, rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        let mut matrix = Self::with_capacity(n_features, rows.len());
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// `values` must hold exactly `n_rows * n_features` entries
    pub(crate) fn from_flat(values: Vec<f64>, n_rows: usize, n_features: usize) -> Self {
        debug_assert_eq!(values.len(), n_rows * n_features);
        Self {
            values,
            n_rows,
            n_features,
        }
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<(), ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        self.values.extend_from_slice(row);
        self.n_rows += 1;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.n_features;
        &self.values[start..start + self.n_features]
    }

    #[inline]
    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.values[row * self.n_features + feature]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n_features.max(1)).take(self.n_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(37), 37);
        assert_eq!(MaxFeatures::Sqrt.resolve(37), 6);
        assert_eq!(MaxFeatures::Fraction(1.0 / 3.0).resolve(37), 12);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(ForestConfig::regression().validate().is_ok());
        assert!(ForestConfig::classification().with_trees(0).validate().is_err());
        let config = ForestConfig {
            max_features: MaxFeatures::Fraction(1.5),
            ..ForestConfig::regression()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tree_rngs_differ_per_tree() {
        use rand::Rng;
        let config = ForestConfig::regression();
        let a: u64 = config.tree_rng(0).gen();
        let b: u64 = config.tree_rng(1).gen();
        let a_again: u64 = config.tree_rng(0).gen();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let mut matrix = FeatureMatrix::with_capacity(3, 2);
        matrix.push_row(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            matrix.push_row(&[1.0]),
            Err(ModelError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.value(0, 2), 3.0);
        assert_eq!(matrix.rows().count(), 1);
    }
}
