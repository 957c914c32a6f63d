//! Random forest regressor used for milk-yield prediction

use super::tree::{DecisionTree, TreeBuilder, Variance};
use super::{FeatureMatrix, ForestConfig};
use crate::error::ModelError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    n_features: usize,
    trees: Vec<DecisionTree<f64>>,
}

impl RandomForestRegressor {
    pub fn fit(
        config: ForestConfig,
        features: &FeatureMatrix,
        targets: &[f64],
    ) -> Result<Self, ModelError> {
        config.validate()?;
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.n_rows() != targets.len() {
            return Err(ModelError::LengthMismatch {
                features: features.n_rows(),
                targets: targets.len(),
            });
        }

        let builder = TreeBuilder {
            criterion: &Variance,
            features,
            targets,
            config: &config,
        };
        let trees: Vec<_> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| builder.grow(&mut config.tree_rng(t)))
            .collect();

        debug!(
            trees = trees.len(),
            rows = features.n_rows(),
            features = features.n_features(),
            mean_leaves = trees.iter().map(|t| t.n_leaves()).sum::<usize>() / trees.len(),
            "Fitted regression forest"
        );

        Ok(Self {
            n_features: features.n_features(),
            config,
            trees,
        })
    }

    /// Mean of the per-tree leaf values
    ///
    /// The result is not clamped; callers that need a non-negative yield
    /// clamp it themselves.
    pub fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict_matrix(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        features.rows().map(|row| self.predict(row)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}
