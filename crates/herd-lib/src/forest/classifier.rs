//! Random forest classifier used for disease detection

use super::tree::{argmax, DecisionTree, Gini, TreeBuilder};
use super::{FeatureMatrix, ForestConfig};
use crate::error::ModelError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Majority-vote label plus the vote share of every known class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPrediction<L: Ord> {
    pub label: L,
    /// Fraction of trees voting for each class; sums to 1.0
    pub confidences: BTreeMap<L, f64>,
}

impl<L: Ord> ClassPrediction<L> {
    pub fn confidence_of(&self, label: &L) -> f64 {
        self.confidences.get(label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier<L> {
    config: ForestConfig,
    n_features: usize,
    /// Sorted; tree leaves hold indices into this list
    classes: Vec<L>,
    trees: Vec<DecisionTree<usize>>,
}

impl<L> RandomForestClassifier<L>
where
    L: Ord + Clone + Send + Sync,
{
    pub fn fit(
        config: ForestConfig,
        features: &FeatureMatrix,
        labels: &[L],
    ) -> Result<Self, ModelError> {
        config.validate()?;
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.n_rows() != labels.len() {
            return Err(ModelError::LengthMismatch {
                features: features.n_rows(),
                targets: labels.len(),
            });
        }

        let classes: Vec<L> = labels.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let targets: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let criterion = Gini {
            n_classes: classes.len(),
        };
        let builder = TreeBuilder {
            criterion: &criterion,
            features,
            targets: &targets,
            config: &config,
        };
        let trees: Vec<_> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| builder.grow(&mut config.tree_rng(t)))
            .collect();

        debug!(
            trees = trees.len(),
            rows = features.n_rows(),
            classes = classes.len(),
            "Fitted classification forest"
        );

        Ok(Self {
            n_features: features.n_features(),
            config,
            classes,
            trees,
        })
    }

    pub fn predict(&self, row: &[f64]) -> Result<ClassPrediction<L>, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        let n_trees = self.trees.len() as f64;
        let confidences = self
            .classes
            .iter()
            .zip(&votes)
            .map(|(class, &v)| (class.clone(), v as f64 / n_trees))
            .collect();

        Ok(ClassPrediction {
            label: self.classes[argmax(&votes)].clone(),
            confidences,
        })
    }

    pub fn predict_matrix(&self, features: &FeatureMatrix) -> Result<Vec<L>, ModelError> {
        features
            .rows()
            .map(|row| self.predict(row).map(|p| p.label))
            .collect()
    }

    /// Classes seen during fitting, sorted
    pub fn classes(&self) -> &[L] {
        &self.classes
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
