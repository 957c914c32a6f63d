//! Pipeline and model persisted as one unit

use super::Predictor;
use crate::error::{ModelError, ServiceError};
use crate::forest::{RandomForestClassifier, RandomForestRegressor};
use crate::models::DiseaseLabel;
use crate::pipeline::{FeaturePipeline, FeatureSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type YieldModel = RandomForestRegressor;
pub type DiseaseModel = RandomForestClassifier<DiseaseLabel>;
pub type YieldBundle = ModelBundle<YieldModel>;
pub type DiseaseBundle = ModelBundle<DiseaseModel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Yield,
    Disease,
}

impl BundleKind {
    pub const ALL: [BundleKind; 2] = [BundleKind::Yield, BundleKind::Disease];

    pub fn as_str(&self) -> &'static str {
        match self {
            BundleKind::Yield => "yield",
            BundleKind::Disease => "disease",
        }
    }

    /// Fixed file name inside the model directory
    pub fn file_name(&self) -> &'static str {
        match self {
            BundleKind::Yield => "yield.bundle",
            BundleKind::Disease => "disease.bundle",
        }
    }

    /// Name of the headline evaluation metric
    pub fn metric_name(&self) -> &'static str {
        match self {
            BundleKind::Yield => "rmse",
            BundleKind::Disease => "accuracy",
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub kind: BundleKind,
    pub created_at: DateTime<Utc>,
    pub training_rows: usize,
    pub test_rows: usize,
    pub feature_width: usize,
    pub n_trees: usize,
    pub metric_name: String,
    pub metric_value: f64,
}

/// A frozen feature pipeline and the ensemble fitted on its output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle<M> {
    pipeline: FeaturePipeline,
    model: M,
    metadata: BundleMetadata,
}

impl<M: Predictor> ModelBundle<M> {
    /// Fails if the model was not fitted on this pipeline's output width
    pub fn new(
        pipeline: FeaturePipeline,
        model: M,
        metadata: BundleMetadata,
    ) -> Result<Self, ModelError> {
        if pipeline.width() != model.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: model.n_features(),
                actual: pipeline.width(),
            });
        }
        Ok(Self {
            pipeline,
            model,
            metadata,
        })
    }

    /// Transform one record with the frozen pipeline and run the model
    pub fn predict_record<S>(&self, record: &S) -> Result<M::Output, ServiceError>
    where
        S: FeatureSource + ?Sized,
    {
        let features = self.pipeline.transform(record)?;
        Ok(self.model.predict(&features)?)
    }
}

impl<M> ModelBundle<M> {
    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> BundleKind {
        self.metadata.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{FeatureMatrix, ForestConfig};
    use crate::models::tests::sample_record;
    use crate::pipeline::PipelineSpec;

    fn metadata(kind: BundleKind, width: usize) -> BundleMetadata {
        BundleMetadata {
            kind,
            created_at: Utc::now(),
            training_rows: 2,
            test_rows: 0,
            feature_width: width,
            n_trees: 5,
            metric_name: kind.metric_name().to_string(),
            metric_value: 0.0,
        }
    }

    #[test]
    fn test_bundle_rejects_width_mismatch() {
        let records = vec![sample_record()];
        let pipeline = PipelineSpec::cattle().fit(&records).unwrap();
        let matrix = FeatureMatrix::from_rows(2, &[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let model =
            RandomForestRegressor::fit(ForestConfig::regression().with_trees(5), &matrix, &[1.0, 2.0])
                .unwrap();
        let result = ModelBundle::new(pipeline, model, metadata(BundleKind::Yield, 2));
        assert!(matches!(result, Err(ModelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_predict_record_goes_through_pipeline() {
        let mut other = sample_record();
        other.breed = crate::models::Breed::Jersey;
        other.weight_kg = 380.0;
        let records = vec![sample_record(), other.clone()];
        let pipeline = PipelineSpec::cattle().fit(&records).unwrap();
        let matrix = pipeline.transform_table(&records).unwrap();
        let model = RandomForestRegressor::fit(
            ForestConfig::regression().with_trees(10),
            &matrix,
            &[30.0, 20.0],
        )
        .unwrap();
        let width = pipeline.width();
        let bundle = ModelBundle::new(pipeline, model, metadata(BundleKind::Yield, width)).unwrap();

        let a = bundle.predict_record(&sample_record()).unwrap();
        let b = bundle.predict_record(&other).unwrap();
        assert!((20.0..=30.0).contains(&a));
        assert!((20.0..=30.0).contains(&b));
        assert_eq!(bundle.kind(), BundleKind::Yield);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(BundleKind::Yield.file_name(), "yield.bundle");
        assert_eq!(BundleKind::Disease.to_string(), "disease");
        assert_eq!(serde_json::to_string(&BundleKind::Disease).unwrap(), "\"disease\"");
    }
}
