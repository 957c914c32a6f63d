//! Offline training
//!
//! Splits the labeled table, fits the feature pipeline once, fits and
//! evaluates both ensembles against it and persists the two bundles.

mod metrics;
mod orchestrator;
mod split;

pub use metrics::{accuracy, rmse, std_dev, ClassMetrics, ClassificationReport};
pub use orchestrator::{
    DiseaseEvaluation, Trainer, TrainingConfig, TrainingOutcome, YieldEvaluation,
    DEFAULT_TEST_FRACTION,
};
pub use split::{stratified_split, train_test_split, Split};
