//! Feature pipeline: raw records to fixed-width numeric vectors
//!
//! A [`PipelineSpec`] names the numeric and categorical columns. Fitting it
//! against a table consumes it and yields a [`FeaturePipeline`], which
//! has no mutating methods: the same frozen instance is shared by training,
//! evaluation and serving.
//!
//! Output layout: every numeric column as a z-score, in declared order,
//! followed by one one-hot block per categorical column, in declared order.
//! Within a block the positions follow the sorted vocabulary.

mod encoder;
mod scaler;

pub use encoder::{CategoryCode, Vocabulary};
pub use scaler::{ColumnScale, RunningStats};

use crate::error::{PipelineError, SchemaError};
use crate::forest::FeatureMatrix;
use crate::models::{CategoricalField, CattleRecord, LabeledRecord, NumericField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// A row the pipeline can read columns from by name
pub trait FeatureSource {
    fn numeric(&self, column: &str) -> Option<f64>;
    fn categorical(&self, column: &str) -> Option<&str>;
}

impl FeatureSource for CattleRecord {
    fn numeric(&self, column: &str) -> Option<f64> {
        NumericField::from_column(column).map(|f| CattleRecord::numeric(self, f))
    }

    fn categorical(&self, column: &str) -> Option<&str> {
        CategoricalField::from_column(column).map(|f| CattleRecord::categorical(self, f))
    }
}

impl FeatureSource for LabeledRecord {
    fn numeric(&self, column: &str) -> Option<f64> {
        FeatureSource::numeric(&self.record, column)
    }

    fn categorical(&self, column: &str) -> Option<&str> {
        FeatureSource::categorical(&self.record, column)
    }
}

/// Unfitted pipeline: the column lists only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl PipelineSpec {
    pub fn new(numeric: Vec<String>, categorical: Vec<String>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for name in numeric.iter().chain(&categorical) {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::DuplicateField(name.clone()));
            }
        }
        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// All 13 numeric and 6 categorical cattle columns
    pub fn cattle() -> Self {
        Self {
            numeric: NumericField::ALL
                .iter()
                .map(|f| f.column_name().to_string())
                .collect(),
            categorical: CategoricalField::ALL
                .iter()
                .map(|f| f.column_name().to_string())
                .collect(),
        }
    }

    /// Compute column statistics and vocabularies in one pass over `rows`
    pub fn fit<S: FeatureSource>(self, rows: &[S]) -> Result<FeaturePipeline, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyTable);
        }

        let mut stats = vec![RunningStats::new(); self.numeric.len()];
        let mut observed = vec![BTreeSet::new(); self.categorical.len()];
        for row in rows {
            for (name, acc) in self.numeric.iter().zip(stats.iter_mut()) {
                if let Some(value) = row.numeric(name) {
                    acc.add_sample(value);
                }
            }
            for (name, seen) in self.categorical.iter().zip(observed.iter_mut()) {
                if let Some(value) = row.categorical(name) {
                    if !seen.contains(value) {
                        seen.insert(value.to_string());
                    }
                }
            }
        }

        let mut numeric = Vec::with_capacity(self.numeric.len());
        for (name, acc) in self.numeric.into_iter().zip(stats) {
            if acc.count() == 0 {
                return Err(PipelineError::FieldAbsent(name));
            }
            numeric.push(NumericColumn {
                name,
                scale: acc.finish(),
            });
        }

        let mut offset = numeric.len();
        let mut categorical = Vec::with_capacity(self.categorical.len());
        for (name, seen) in self.categorical.into_iter().zip(observed) {
            if seen.is_empty() {
                return Err(PipelineError::FieldAbsent(name));
            }
            let vocabulary = Vocabulary::from_observed(seen);
            let width = vocabulary.len();
            categorical.push(CategoricalColumn {
                name,
                vocabulary,
                offset,
            });
            offset += width;
        }

        debug!(
            rows = rows.len(),
            numeric = numeric.len(),
            categorical = categorical.len(),
            width = offset,
            "Fitted feature pipeline"
        );

        Ok(FeaturePipeline {
            numeric,
            categorical,
            width: offset,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub scale: ColumnScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub vocabulary: Vocabulary,
    /// First output position of this column's one-hot block
    pub offset: usize,
}

/// Fitted, immutable feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    width: usize,
}

impl FeaturePipeline {
    /// Length of every transformed vector
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Output column names, e.g. `Age` or `Breed=Holstein`
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            names.extend(
                column
                    .vocabulary
                    .values()
                    .iter()
                    .map(|v| format!("{}={}", column.name, v)),
            );
        }
        names
    }

    /// Encoding of one categorical value, or `None` for an unknown column
    pub fn encode(&self, column: &str, value: &str) -> Option<CategoryCode> {
        self.categorical
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.vocabulary.encode(value))
    }

    /// Transform one row. Unseen categorical values encode as all zeros;
    /// a missing column is a schema error.
    pub fn transform<S: FeatureSource + ?Sized>(&self, row: &S) -> Result<Vec<f64>, PipelineError> {
        let mut out = vec![0.0; self.width];
        self.transform_into(row, &mut out)?;
        Ok(out)
    }

    /// `out` must be `width()` long and zeroed
    fn transform_into<S: FeatureSource + ?Sized>(
        &self,
        row: &S,
        out: &mut [f64],
    ) -> Result<(), PipelineError> {
        for (slot, column) in out.iter_mut().zip(&self.numeric) {
            let value = row
                .numeric(&column.name)
                .ok_or_else(|| SchemaError::MissingField(column.name.clone()))?;
            *slot = column.scale.scale(value);
        }
        for column in &self.categorical {
            let value = row
                .categorical(&column.name)
                .ok_or_else(|| SchemaError::MissingField(column.name.clone()))?;
            let block = &mut out[column.offset..column.offset + column.vocabulary.len()];
            column.vocabulary.one_hot_into(value, block);
        }
        Ok(())
    }

    pub fn transform_table<S: FeatureSource>(&self, rows: &[S]) -> Result<FeatureMatrix, PipelineError> {
        let mut values = vec![0.0; self.width * rows.len()];
        for (row, out) in rows.iter().zip(values.chunks_exact_mut(self.width.max(1))) {
            self.transform_into(row, out)?;
        }
        Ok(FeatureMatrix::from_flat(values, rows.len(), self.width))
    }
}
