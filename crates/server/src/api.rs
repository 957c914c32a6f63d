//! HTTP API for predictions, record lookup, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use herd_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    predictor::{BundleKind, BundleStatus, DiseasePrediction, YieldPrediction},
    CattleRecord, CsvRecordStore, LabeledRecord, PredictionService, ServiceError, ServiceMetrics,
    StoreError, StructuredLogger,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub predictions: Arc<PredictionService>,
    pub records: Arc<CsvRecordStore>,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        predictions: PredictionService,
        records: Arc<CsvRecordStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            predictions: Arc::new(predictions),
            records,
            logger,
        }
    }
}

/// Error returned by a handler, rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    Body(JsonRejection),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Schema(schema) => ApiError::Service(ServiceError::Schema(schema)),
            other => ApiError::Service(ServiceError::Store(other)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("record store task failed: {}", err))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(ServiceError::Schema(_) | ServiceError::Pipeline(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Service(ServiceError::ModelUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::Model(_) | ServiceError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Body(JsonRejection::JsonDataError(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Service(err) => err.to_string(),
            ApiError::Body(rejection) => rejection.body_text(),
            ApiError::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            warn!(status = status.as_u16(), detail = %detail, "Request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Herd prediction service is running. See /models for loaded bundles."
    }))
}

async fn predict_yield(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CattleRecord>, JsonRejection>,
) -> Result<Json<YieldPrediction>, ApiError> {
    let Json(record) = payload?;
    Ok(Json(state.predictions.predict_yield(&record)?))
}

async fn predict_disease(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CattleRecord>, JsonRejection>,
) -> Result<Json<DiseasePrediction>, ApiError> {
    let Json(record) = payload?;
    Ok(Json(state.predictions.predict_disease(&record)?))
}

/// Most recently stored record for an animal
async fn get_cattle(
    State(state): State<Arc<AppState>>,
    Path(animal_id): Path<String>,
) -> Result<Json<LabeledRecord>, ApiError> {
    let records = Arc::clone(&state.records);
    let id = animal_id.clone();
    let found = tokio::task::spawn_blocking(move || records.find(&id)).await??;
    found
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(animal_id).into())
}

async fn add_cattle(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LabeledRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(record) = payload?;
    let records = Arc::clone(&state.records);
    let stored = record.clone();
    tokio::task::spawn_blocking(move || records.append(&stored)).await??;

    let animal_id = record.animal_id().unwrap_or_default().to_string();
    state.logger.log_record_appended(&animal_id);
    state.metrics.inc_records_stored();
    // a missing table is created by the first append; an unreadable one is
    // not repaired by appending to it
    state
        .health_registry
        .clear_degraded(components::RECORD_STORE)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "stored", "animal_id": animal_id })),
    ))
}

async fn models(State(state): State<Arc<AppState>>) -> Json<Vec<BundleStatus>> {
    Json(state.predictions.status())
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::Internal(format!("failed to encode metrics: {}", e)).into_response(),
    }
}

/// Mirror bundle availability into the health registry
///
/// A missing bundle degrades the service rather than failing it: the other
/// model and record lookup keep working.
pub async fn report_model_health(registry: &HealthRegistry, predictions: &PredictionService) {
    for status in predictions.status() {
        let component = match status.kind {
            BundleKind::Yield => components::YIELD_MODEL,
            BundleKind::Disease => components::DISEASE_MODEL,
        };
        registry.register(component).await;
        if status.available {
            registry.set_healthy(component).await;
        } else {
            let reason = status
                .error
                .unwrap_or_else(|| format!("{} bundle unavailable", status.kind));
            registry.set_degraded(component, reason).await;
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict-yield", post(predict_yield))
        .route("/predict-disease", post(predict_disease))
        .route("/cattle", post(add_cattle))
        .route("/cattle/:animal_id", get(get_cattle))
        .route("/models", get(models))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
