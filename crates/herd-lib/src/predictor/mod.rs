//! Prediction engine
//!
//! A [`ModelBundle`] pairs the frozen feature pipeline with one fitted
//! ensemble. The [`PredictionService`] owns both bundles for the lifetime of
//! the process and turns a raw cattle record into a response.

mod bundle;
mod output;
mod service;

pub use bundle::{
    BundleKind, BundleMetadata, DiseaseBundle, DiseaseModel, ModelBundle, YieldBundle, YieldModel,
};
pub use output::{
    confidence_percentages, round_to, DiseasePrediction, RiskLevel, YieldPrediction,
    STATUS_SUCCESS,
};
pub use service::{BundleStatus, PredictionService};

use crate::error::ModelError;
use crate::forest::{ClassPrediction, RandomForestClassifier, RandomForestRegressor};

/// A fitted model that maps one transformed feature vector to an output
pub trait Predictor: Send + Sync {
    type Output;

    fn predict(&self, features: &[f64]) -> Result<Self::Output, ModelError>;

    /// Width of the feature vectors the model was fitted on
    fn n_features(&self) -> usize;
}

impl Predictor for RandomForestRegressor {
    type Output = f64;

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        RandomForestRegressor::predict(self, features)
    }

    fn n_features(&self) -> usize {
        RandomForestRegressor::n_features(self)
    }
}

impl<L> Predictor for RandomForestClassifier<L>
where
    L: Ord + Clone + Send + Sync,
{
    type Output = ClassPrediction<L>;

    fn predict(&self, features: &[f64]) -> Result<ClassPrediction<L>, ModelError> {
        RandomForestClassifier::predict(self, features)
    }

    fn n_features(&self) -> usize {
        RandomForestClassifier::n_features(self)
    }
}
