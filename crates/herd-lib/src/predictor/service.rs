//! Request-scoped prediction over bundles loaded once at start-up

use super::bundle::{BundleKind, BundleMetadata, DiseaseBundle, YieldBundle};
use super::output::{DiseasePrediction, YieldPrediction};
use crate::error::ServiceError;
use crate::models::CattleRecord;
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::store::BundleStore;
use serde::Serialize;
use std::time::Instant;

/// A loaded bundle, or the reason it could not be loaded
type Slot<B> = Result<B, String>;

/// Availability and metadata of one bundle, as reported by `/models`
#[derive(Debug, Clone, Serialize)]
pub struct BundleStatus {
    pub kind: BundleKind,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BundleMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns both bundles for the lifetime of the process
///
/// The bundles are never refitted or mutated after construction, so a
/// single instance can be shared across concurrent requests without
/// locking.
pub struct PredictionService {
    yield_bundle: Slot<YieldBundle>,
    disease_bundle: Slot<DiseaseBundle>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    /// Load both bundles; a failed load is recorded, not returned
    pub fn load(store: &BundleStore, logger: StructuredLogger) -> Self {
        let yield_bundle = store.load_yield().map_err(|e| e.to_string());
        let disease_bundle = store.load_disease().map_err(|e| e.to_string());
        Self::from_slots(yield_bundle, disease_bundle, logger)
    }

    pub fn from_bundles(
        yield_bundle: Option<YieldBundle>,
        disease_bundle: Option<DiseaseBundle>,
        logger: StructuredLogger,
    ) -> Self {
        let never_trained = |kind: BundleKind| format!("no {} bundle provided", kind);
        Self::from_slots(
            yield_bundle.ok_or_else(|| never_trained(BundleKind::Yield)),
            disease_bundle.ok_or_else(|| never_trained(BundleKind::Disease)),
            logger,
        )
    }

    fn from_slots(
        yield_bundle: Slot<YieldBundle>,
        disease_bundle: Slot<DiseaseBundle>,
        logger: StructuredLogger,
    ) -> Self {
        let service = Self {
            yield_bundle,
            disease_bundle,
            metrics: ServiceMetrics::new(),
            logger,
        };
        for status in service.status() {
            let kind = status.kind.as_str();
            service.metrics.set_model_loaded(kind, status.available);
            match (&status.metadata, &status.error) {
                (Some(meta), _) => {
                    service
                        .logger
                        .log_bundle_loaded(kind, meta.training_rows, meta.feature_width)
                }
                (None, Some(reason)) => service.logger.log_bundle_failed(kind, reason),
                (None, None) => {}
            }
        }
        service
    }

    pub fn predict_yield(&self, record: &CattleRecord) -> Result<YieldPrediction, ServiceError> {
        self.observe(BundleKind::Yield, || {
            let bundle = available(&self.yield_bundle, BundleKind::Yield)?;
            record.validate()?;
            let raw = bundle.predict_record(record)?;
            Ok(YieldPrediction::from_raw(raw))
        })
    }

    pub fn predict_disease(
        &self,
        record: &CattleRecord,
    ) -> Result<DiseasePrediction, ServiceError> {
        self.observe(BundleKind::Disease, || {
            let bundle = available(&self.disease_bundle, BundleKind::Disease)?;
            record.validate()?;
            let prediction = bundle.predict_record(record)?;
            Ok(DiseasePrediction::from_raw(&prediction))
        })
    }

    pub fn is_available(&self, kind: BundleKind) -> bool {
        match kind {
            BundleKind::Yield => self.yield_bundle.is_ok(),
            BundleKind::Disease => self.disease_bundle.is_ok(),
        }
    }

    pub fn loaded_count(&self) -> usize {
        BundleKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .count()
    }

    pub fn status(&self) -> Vec<BundleStatus> {
        vec![
            slot_status(BundleKind::Yield, &self.yield_bundle),
            slot_status(BundleKind::Disease, &self.disease_bundle),
        ]
    }

    fn observe<T>(
        &self,
        kind: BundleKind,
        predict: impl FnOnce() -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let start = Instant::now();
        let result = predict();
        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => {
                self.metrics.observe_prediction(kind.as_str(), elapsed);
                self.logger
                    .log_prediction(kind.as_str(), "success", elapsed * 1000.0);
            }
            Err(e) => {
                self.metrics
                    .inc_prediction_errors(kind.as_str(), error_reason(e));
                self.logger
                    .log_prediction(kind.as_str(), error_reason(e), elapsed * 1000.0);
            }
        }
        result
    }
}

fn available<B>(slot: &Slot<B>, kind: BundleKind) -> Result<&B, ServiceError> {
    slot.as_ref().map_err(|reason| ServiceError::ModelUnavailable {
        kind: kind.to_string(),
        reason: reason.clone(),
    })
}

fn slot_status<M>(kind: BundleKind, slot: &Slot<super::ModelBundle<M>>) -> BundleStatus {
    match slot {
        Ok(bundle) => BundleStatus {
            kind,
            available: true,
            metadata: Some(bundle.metadata().clone()),
            error: None,
        },
        Err(reason) => BundleStatus {
            kind,
            available: false,
            metadata: None,
            error: Some(reason.clone()),
        },
    }
}

fn error_reason(error: &ServiceError) -> &'static str {
    match error {
        ServiceError::Schema(_) | ServiceError::Pipeline(_) => "schema",
        ServiceError::ModelUnavailable { .. } => "model_unavailable",
        ServiceError::Model(_) => "model",
        ServiceError::Store(_) => "store",
        ServiceError::NotFound(_) => "not_found",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestConfig, RandomForestClassifier, RandomForestRegressor};
    use crate::generator::{GeneratorConfig, SyntheticGenerator};
    use crate::models::tests::sample_record;
    use crate::models::{Breed, DiseaseLabel};
    use crate::pipeline::PipelineSpec;
    use crate::predictor::{BundleMetadata, ModelBundle, RiskLevel};
    use chrono::Utc;
    use tempfile::TempDir;

    fn trained() -> (YieldBundle, DiseaseBundle) {
        let records = SyntheticGenerator::new(GeneratorConfig { samples: 120, seed: 11 }).generate();
        let pipeline = PipelineSpec::cattle().fit(&records).unwrap();
        let matrix = pipeline.transform_table(&records).unwrap();
        let yields: Vec<f64> = records.iter().map(|r| r.milk_yield).collect();
        let labels: Vec<DiseaseLabel> = records.iter().map(|r| r.disease_label).collect();
        let metadata = |kind: BundleKind| BundleMetadata {
            kind,
            created_at: Utc::now(),
            training_rows: records.len(),
            test_rows: 0,
            feature_width: pipeline.width(),
            n_trees: 20,
            metric_name: kind.metric_name().to_string(),
            metric_value: 0.0,
        };
        let regressor =
            RandomForestRegressor::fit(ForestConfig::regression().with_trees(20), &matrix, &yields)
                .unwrap();
        let classifier = RandomForestClassifier::fit(
            ForestConfig::classification().with_trees(20),
            &matrix,
            &labels,
        )
        .unwrap();
        (
            ModelBundle::new(pipeline.clone(), regressor, metadata(BundleKind::Yield)).unwrap(),
            ModelBundle::new(pipeline.clone(), classifier, metadata(BundleKind::Disease)).unwrap(),
        )
    }

    fn logger() -> StructuredLogger {
        StructuredLogger::new("herd-test")
    }

    #[test]
    fn test_predictions_with_both_bundles() {
        let (y, d) = trained();
        let service = PredictionService::from_bundles(Some(y), Some(d), logger());
        assert_eq!(service.loaded_count(), 2);

        let yield_response = service.predict_yield(&sample_record()).unwrap();
        assert!(yield_response.predicted_milk_yield_liters >= 0.0);
        assert_eq!(yield_response.status, "success");

        let disease = service.predict_disease(&sample_record()).unwrap();
        let total: f64 = disease.confidence_scores.values().sum();
        assert!((total - 100.0).abs() < 0.05);
        let expected_risk = RiskLevel::for_label(disease.predicted_condition);
        assert_eq!(disease.risk_assessment, expected_risk);
    }

    #[test]
    fn test_missing_bundle_is_model_unavailable() {
        let (y, _) = trained();
        let service = PredictionService::from_bundles(Some(y), None, logger());

        assert!(service.predict_yield(&sample_record()).is_ok());
        assert!(matches!(
            service.predict_disease(&sample_record()),
            Err(ServiceError::ModelUnavailable { ref kind, .. }) if kind == "disease"
        ));

        let status = service.status();
        assert!(status[0].available);
        assert!(!status[1].available);
        assert!(status[1].error.is_some());
    }

    #[test]
    fn test_invalid_record_is_schema_error() {
        let (y, d) = trained();
        let service = PredictionService::from_bundles(Some(y), Some(d), logger());
        let mut record = sample_record();
        record.weight_kg = f64::NAN;
        assert!(matches!(
            service.predict_yield(&record),
            Err(ServiceError::Schema(_))
        ));
    }

    #[test]
    fn test_unseen_breed_still_predicts() {
        let (y, d) = trained();
        let service = PredictionService::from_bundles(Some(y), Some(d), logger());
        let mut record = sample_record();
        record.breed = Breed::Other("Brown Swiss".to_string());
        assert!(service.predict_yield(&record).is_ok());
        assert!(service.predict_disease(&record).is_ok());
    }

    #[test]
    fn test_load_from_empty_store_starts_degraded() {
        let dir = TempDir::new().unwrap();
        let service = PredictionService::load(&BundleStore::new(dir.path()), logger());
        assert_eq!(service.loaded_count(), 0);
        assert!(matches!(
            service.predict_yield(&sample_record()),
            Err(ServiceError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_load_from_saved_store() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let (y, d) = trained();
        let direct = PredictionService::from_bundles(Some(y.clone()), Some(d.clone()), logger());
        store.save_pair(&y, &d).unwrap();

        let loaded = PredictionService::load(&store, logger());
        assert_eq!(loaded.loaded_count(), 2);
        assert_eq!(
            loaded.predict_yield(&sample_record()).unwrap(),
            direct.predict_yield(&sample_record()).unwrap()
        );
        assert_eq!(
            loaded.predict_disease(&sample_record()).unwrap(),
            direct.predict_disease(&sample_record()).unwrap()
        );
    }
}
