//! Observability for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, served and failed predictions,
//!   loaded bundles, stored records)
//! - Structured JSON logging of lifecycle events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Encoder, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5,
];

static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_served: IntCounterVec,
    prediction_errors: IntCounterVec,
    model_loaded: IntGaugeVec,
    records_stored: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "herd_prediction_latency_seconds",
                "Time spent transforming a record and running the model",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_served: register_int_counter_vec!(
                "herd_predictions_served_total",
                "Total number of predictions served",
                &["model"]
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter_vec!(
                "herd_prediction_errors_total",
                "Total number of rejected or failed prediction requests",
                &["model", "reason"]
            )
            .expect("Failed to register prediction_errors"),

            model_loaded: register_int_gauge_vec!(
                "herd_model_loaded",
                "Whether the model bundle is loaded (1) or unavailable (0)",
                &["model"]
            )
            .expect("Failed to register model_loaded"),

            records_stored: register_int_gauge!(
                "herd_records_stored",
                "Number of records in the record store at last read"
            )
            .expect("Failed to register records_stored"),
        }
    }
}

/// Handle to the process-wide metrics; clones share the same registry
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction(&self, model: &str, duration_secs: f64) {
        let inner = self.inner();
        inner
            .prediction_latency_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
        inner.predictions_served.with_label_values(&[model]).inc();
    }

    pub fn inc_prediction_errors(&self, model: &str, reason: &str) {
        self.inner()
            .prediction_errors
            .with_label_values(&[model, reason])
            .inc();
    }

    pub fn set_model_loaded(&self, model: &str, loaded: bool) {
        self.inner()
            .model_loaded
            .with_label_values(&[model])
            .set(i64::from(loaded));
    }

    pub fn set_records_stored(&self, count: usize) {
        self.inner().records_stored.set(count as i64);
    }

    pub fn inc_records_stored(&self) {
        self.inner().records_stored.inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Structured logger for service lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, models_loaded: usize) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            models_loaded = models_loaded,
            "Prediction service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction service shutting down"
        );
    }

    pub fn log_bundle_loaded(&self, kind: &str, training_rows: usize, feature_width: usize) {
        info!(
            event = "bundle_loaded",
            service = %self.service,
            model = %kind,
            training_rows = training_rows,
            feature_width = feature_width,
            "Model bundle loaded"
        );
    }

    pub fn log_bundle_failed(&self, kind: &str, reason: &str) {
        warn!(
            event = "bundle_load_failed",
            service = %self.service,
            model = %kind,
            reason = %reason,
            "Model bundle unavailable, predictions for this model will be rejected"
        );
    }

    pub fn log_prediction(&self, kind: &str, outcome: &str, latency_ms: f64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            model = %kind,
            outcome = %outcome,
            latency_ms = latency_ms,
            "Prediction served"
        );
    }

    pub fn log_training_complete(
        &self,
        training_rows: usize,
        test_rows: usize,
        rmse: f64,
        accuracy: f64,
    ) {
        info!(
            event = "training_complete",
            service = %self.service,
            training_rows = training_rows,
            test_rows = test_rows,
            rmse = rmse,
            accuracy = accuracy,
            "Training run complete, bundles persisted"
        );
    }

    pub fn log_training_failed(&self, reason: &str) {
        error!(
            event = "training_failed",
            service = %self.service,
            reason = %reason,
            "Training run aborted, no bundles written"
        );
    }

    pub fn log_record_appended(&self, animal_id: &str) {
        info!(
            event = "record_appended",
            service = %self.service,
            animal_id = %animal_id,
            "Record appended to store"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exposed() {
        let metrics = ServiceMetrics::new();
        metrics.observe_prediction("yield", 0.002);
        metrics.inc_prediction_errors("disease", "schema");
        metrics.set_model_loaded("yield", true);
        metrics.set_records_stored(12);

        let text = metrics.render().unwrap();
        assert!(text.contains("herd_predictions_served_total"));
        assert!(text.contains("herd_model_loaded"));
        assert!(text.contains("herd_records_stored"));
    }

    #[test]
    fn test_handles_share_registry() {
        let a = ServiceMetrics::new();
        let b = a.clone();
        a.set_model_loaded("disease", false);
        b.set_model_loaded("disease", true);
        assert!(ServiceMetrics::default().render().is_ok());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("herd-test");
        assert_eq!(logger.service, "herd-test");
    }
}
