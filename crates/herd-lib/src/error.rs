//! Error types shared across the library

use thiserror::Error;

/// A record does not match the expected schema
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("table is missing required column '{0}'")]
    MissingColumn(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("cannot fit feature pipeline on an empty table")]
    EmptyTable,

    #[error("field '{0}' is absent from every row of the table")]
    FieldAbsent(String),

    #[error("field '{0}' is listed more than once")]
    DuplicateField(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("feature vector has {actual} columns, model was fitted on {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot fit a model on zero rows")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Record or bundle storage failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("bundle encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("bundle at {path} holds a {actual} model, expected {expected}")]
    KindMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported bundle format version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Fatal failure of an offline training run
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training table is empty")]
    EmptyTable,

    #[error("training record rejected: {0}")]
    Schema(#[from] SchemaError),

    #[error("training table could not be read: {0}")]
    Store(#[from] StoreError),

    #[error("feature pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("model fitting failed: {0}")]
    Model(#[from] ModelError),

    #[error("split left the {0} partition empty")]
    EmptyPartition(&'static str),
}

/// Failure of a single prediction service request
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("{kind} model unavailable: {reason}")]
    ModelUnavailable { kind: String, reason: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no record found for animal '{0}'")]
    NotFound(String),
}
