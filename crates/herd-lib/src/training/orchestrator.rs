//! Training run: split, fit, evaluate, persist

use super::metrics::{accuracy, rmse, std_dev, ClassificationReport};
use super::split::{stratified_split, train_test_split, Split};
use crate::error::{ModelError, TrainingError};
use crate::forest::{ForestConfig, DEFAULT_SEED};
use crate::models::{DiseaseLabel, LabeledRecord};
use crate::observability::StructuredLogger;
use crate::pipeline::{FeaturePipeline, PipelineSpec};
use crate::predictor::{
    BundleKind, BundleMetadata, DiseaseBundle, DiseaseModel, ModelBundle, YieldBundle, YieldModel,
};
use crate::store::{BundleStore, CsvRecordStore};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation, in (0, 1)
    pub test_fraction: f64,
    /// Seed of both train/test splits
    pub seed: u64,
    pub yield_forest: ForestConfig,
    pub disease_forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            yield_forest: ForestConfig::regression(),
            disease_forest: ForestConfig::classification(),
        }
    }
}

impl TrainingConfig {
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.yield_forest.n_trees = n_trees;
        self.disease_forest.n_trees = n_trees;
        self
    }

    /// Seed the splits and both forests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.yield_forest.seed = seed;
        self.disease_forest.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ModelError::InvalidConfig(format!(
                "test_fraction {} is outside (0, 1)",
                self.test_fraction
            )));
        }
        self.yield_forest.validate()?;
        self.disease_forest.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldEvaluation {
    pub rmse: f64,
    /// Standard deviation of the held-out yields, the RMSE of a constant guess
    pub baseline_std_dev: f64,
    pub test_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseEvaluation {
    pub accuracy: f64,
    pub report: ClassificationReport<DiseaseLabel>,
    pub test_rows: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub yield_bundle: YieldBundle,
    pub disease_bundle: DiseaseBundle,
    pub yield_eval: YieldEvaluation,
    pub disease_eval: DiseaseEvaluation,
    /// Rows the feature pipeline was fitted on
    pub pipeline_rows: usize,
}

pub struct Trainer {
    config: TrainingConfig,
    logger: StructuredLogger,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("herd-train"),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Read the table, train and persist both bundles
    ///
    /// Any failure leaves the bundle directory untouched.
    pub fn run(
        &self,
        records: &CsvRecordStore,
        bundles: &BundleStore,
    ) -> Result<TrainingOutcome, TrainingError> {
        let result = records
            .read_all()
            .map_err(TrainingError::from)
            .and_then(|table| self.train(&table))
            .and_then(|outcome| {
                bundles.save_pair(&outcome.yield_bundle, &outcome.disease_bundle)?;
                Ok(outcome)
            });

        match &result {
            Ok(outcome) => self.logger.log_training_complete(
                outcome.pipeline_rows,
                outcome.yield_eval.test_rows,
                outcome.yield_eval.rmse,
                outcome.disease_eval.accuracy,
            ),
            Err(e) => self.logger.log_training_failed(&e.to_string()),
        }
        result
    }

    /// Train both bundles in memory without persisting them
    pub fn train(&self, table: &[LabeledRecord]) -> Result<TrainingOutcome, TrainingError> {
        self.config.validate()?;
        if table.is_empty() {
            return Err(TrainingError::EmptyTable);
        }
        for record in table {
            record.validate()?;
        }

        let labels: Vec<DiseaseLabel> = table.iter().map(|r| r.disease_label).collect();
        let yields: Vec<f64> = table.iter().map(|r| r.milk_yield).collect();

        let yield_split = train_test_split(table.len(), self.config.test_fraction, self.config.seed);
        let disease_split = stratified_split(&labels, self.config.test_fraction, self.config.seed);
        let partitions = [
            ("yield training", &yield_split.train),
            ("yield test", &yield_split.test),
            ("disease training", &disease_split.train),
            ("disease test", &disease_split.test),
        ];
        for (name, rows) in partitions {
            if rows.is_empty() {
                return Err(TrainingError::EmptyPartition(name));
            }
        }

        let pipeline = fit_pipeline(table, &yield_split, &disease_split)?;
        let pipeline_rows = pipeline_fit_rows(&yield_split, &disease_split).len();
        info!(
            rows = pipeline_rows,
            width = pipeline.width(),
            "Fitted feature pipeline"
        );

        let (yield_bundle, yield_eval) = self.fit_yield(table, &yields, &yield_split, &pipeline)?;
        let (disease_bundle, disease_eval) =
            self.fit_disease(table, &labels, &disease_split, pipeline)?;

        Ok(TrainingOutcome {
            yield_bundle,
            disease_bundle,
            yield_eval,
            disease_eval,
            pipeline_rows,
        })
    }

    fn fit_yield(
        &self,
        table: &[LabeledRecord],
        yields: &[f64],
        split: &Split,
        pipeline: &FeaturePipeline,
    ) -> Result<(YieldBundle, YieldEvaluation), TrainingError> {
        let train_x = pipeline.transform_table(&select(table, &split.train))?;
        let test_x = pipeline.transform_table(&select(table, &split.test))?;
        let train_y = select(yields, &split.train);
        let test_y = select(yields, &split.test);

        let model = YieldModel::fit(self.config.yield_forest.clone(), &train_x, &train_y)?;
        let predictions = model.predict_matrix(&test_x)?;
        let eval = YieldEvaluation {
            rmse: rmse(&predictions, &test_y),
            baseline_std_dev: std_dev(&test_y),
            test_rows: test_y.len(),
        };
        info!(
            rmse = eval.rmse,
            baseline_std_dev = eval.baseline_std_dev,
            test_rows = eval.test_rows,
            "Evaluated yield model"
        );

        let metadata = BundleMetadata {
            kind: BundleKind::Yield,
            created_at: Utc::now(),
            training_rows: train_y.len(),
            test_rows: test_y.len(),
            feature_width: pipeline.width(),
            n_trees: model.n_trees(),
            metric_name: BundleKind::Yield.metric_name().to_string(),
            metric_value: eval.rmse,
        };
        let bundle = ModelBundle::new(pipeline.clone(), model, metadata)?;
        Ok((bundle, eval))
    }

    fn fit_disease(
        &self,
        table: &[LabeledRecord],
        labels: &[DiseaseLabel],
        split: &Split,
        pipeline: FeaturePipeline,
    ) -> Result<(DiseaseBundle, DiseaseEvaluation), TrainingError> {
        let train_x = pipeline.transform_table(&select(table, &split.train))?;
        let test_x = pipeline.transform_table(&select(table, &split.test))?;
        let train_y = select(labels, &split.train);
        let test_y = select(labels, &split.test);

        let model = DiseaseModel::fit(self.config.disease_forest.clone(), &train_x, &train_y)?;
        let predictions = model.predict_matrix(&test_x)?;
        let report = ClassificationReport::compute(&DiseaseLabel::ALL, &predictions, &test_y);
        let eval = DiseaseEvaluation {
            accuracy: accuracy(&predictions, &test_y),
            report,
            test_rows: test_y.len(),
        };
        info!(
            accuracy = eval.accuracy,
            macro_f1 = eval.report.macro_f1,
            test_rows = eval.test_rows,
            "Evaluated disease model"
        );

        let metadata = BundleMetadata {
            kind: BundleKind::Disease,
            created_at: Utc::now(),
            training_rows: train_y.len(),
            test_rows: test_y.len(),
            feature_width: pipeline.width(),
            n_trees: model.n_trees(),
            metric_name: BundleKind::Disease.metric_name().to_string(),
            metric_value: eval.accuracy,
        };
        let bundle = ModelBundle::new(pipeline, model, metadata)?;
        Ok((bundle, eval))
    }
}

/// Rows in the training partition of either split, ascending.
///
/// The pipeline is fitted on this union so every row either model trains on
/// shapes the encoding. A row can sit in one model's test partition and the
/// other's training partition, so the scaler statistics may see a handful of
/// rows one of the models later evaluates on.
fn pipeline_fit_rows(yield_split: &Split, disease_split: &Split) -> Vec<usize> {
    yield_split
        .train
        .iter()
        .chain(&disease_split.train)
        .copied()
        .collect::<BTreeSet<usize>>()
        .into_iter()
        .collect()
}

fn fit_pipeline(
    table: &[LabeledRecord],
    yield_split: &Split,
    disease_split: &Split,
) -> Result<FeaturePipeline, TrainingError> {
    let rows = pipeline_fit_rows(yield_split, disease_split);
    if rows.is_empty() {
        return Err(TrainingError::EmptyPartition("pipeline fitting"));
    }
    Ok(PipelineSpec::cattle().fit(&select(table, &rows))?)
}

fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}
