//! Dairy herd milk yield and disease prediction
//!
//! This crate provides the core functionality for:
//! - Synthetic labeled cattle records
//! - A fitted, frozen feature pipeline
//! - Random forest yield regression and disease classification
//! - Offline training and bundle persistence
//! - Request-scoped prediction over the persisted bundles
//! - Health checks and observability

pub mod error;
pub mod forest;
pub mod generator;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod store;
pub mod training;

pub use error::{ModelError, PipelineError, SchemaError, ServiceError, StoreError, TrainingError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{BundleKind, PredictionService};
pub use store::{BundleStore, CsvRecordStore};
