//! Integration tests for the herd API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use herd_lib::{
    generator::{GeneratorConfig, SyntheticGenerator},
    health::{components, ComponentStatus, HealthRegistry},
    predictor::{DiseasePrediction, YieldPrediction},
    training::{Trainer, TrainingConfig, TrainingOutcome},
    CsvRecordStore, LabeledRecord, PredictionService, ServiceMetrics, StructuredLogger,
};
use herd_server::api::{create_router, report_model_health, AppState};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tower::ServiceExt;

fn herd() -> &'static Vec<LabeledRecord> {
    static HERD: OnceLock<Vec<LabeledRecord>> = OnceLock::new();
    HERD.get_or_init(|| SyntheticGenerator::new(GeneratorConfig { samples: 120, seed: 9 }).generate())
}

fn trained() -> &'static TrainingOutcome {
    static OUTCOME: OnceLock<TrainingOutcome> = OnceLock::new();
    OUTCOME.get_or_init(|| {
        Trainer::new(TrainingConfig::default().with_trees(15))
            .train(herd())
            .unwrap()
    })
}

fn untrained_service() -> PredictionService {
    PredictionService::from_bundles(None, None, StructuredLogger::new("herd-api-test"))
}

fn trained_service() -> PredictionService {
    let outcome = trained();
    PredictionService::from_bundles(
        Some(outcome.yield_bundle.clone()),
        Some(outcome.disease_bundle.clone()),
        StructuredLogger::new("herd-api-test"),
    )
}

struct TestApp {
    router: Router,
    registry: HealthRegistry,
    _dir: TempDir,
}

async fn test_app(predictions: PredictionService) -> TestApp {
    let dir = TempDir::new().unwrap();
    let records = CsvRecordStore::new(dir.path().join("cattle_data.csv"));
    let registry = HealthRegistry::new();
    registry.register(components::RECORD_STORE).await;
    report_model_health(&registry, &predictions).await;

    let state = Arc::new(AppState::new(
        registry.clone(),
        ServiceMetrics::new(),
        predictions,
        Arc::new(records),
        StructuredLogger::new("herd-api-test"),
    ));
    TestApp {
        router: create_router(state),
        registry,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_root_banner() {
    let app = test_app(untrained_service()).await;
    let (status, body) = send(&app.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_healthz_degraded_without_models() {
    let app = test_app(untrained_service()).await;
    let (status, body) = send(&app.router, get("/healthz")).await;

    // Degraded is still operational
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["components"]["yield_model"]["status"], "degraded");
    assert_eq!(json["components"]["record_store"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_unhealthy_returns_503() {
    let app = test_app(trained_service()).await;
    app.registry
        .set_unhealthy(components::RECORD_STORE, "disk full")
        .await;
    let (status, _) = send(&app.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_not_ready_then_ready() {
    let app = test_app(untrained_service()).await;
    let (status, body) = send(&app.router, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ready"], false);

    app.registry.set_ready(true).await;
    let (status, _) = send(&app.router, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app(trained_service()).await;
    let record = serde_json::to_string(&herd()[0].record).unwrap();
    let (status, _) = send(&app.router, post_json("/predict-yield", record)).await;
    assert_eq!(status, StatusCode::OK);

    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("herd_predictions_served_total"));
    assert!(text.contains("herd_model_loaded"));
}

#[tokio::test]
async fn test_predict_without_models_is_unavailable() {
    let app = test_app(untrained_service()).await;
    let record = serde_json::to_string(&herd()[0].record).unwrap();

    for uri in ["/predict-yield", "/predict-disease"] {
        let (status, body) = send(&app.router, post_json(uri, record.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("unavailable"));
    }
}

#[tokio::test]
async fn test_predict_yield() {
    let app = test_app(trained_service()).await;
    let record = serde_json::to_string(&herd()[5].record).unwrap();
    let (status, body) = send(&app.router, post_json("/predict-yield", record)).await;

    assert_eq!(status, StatusCode::OK);
    let response: YieldPrediction = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.status, "success");
    assert!(response.predicted_milk_yield_liters >= 0.0);
    let cents = response.predicted_milk_yield_liters * 100.0;
    assert!((cents - cents.round()).abs() < 1e-6);
}

#[tokio::test]
async fn test_predict_disease() {
    let app = test_app(trained_service()).await;
    let record = serde_json::to_string(&herd()[1].record).unwrap();
    let (status, body) = send(&app.router, post_json("/predict-disease", record)).await;

    assert_eq!(status, StatusCode::OK);
    let response: DiseasePrediction = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.status, "success");
    let total: f64 = response.confidence_scores.values().sum();
    assert!((total - 100.0).abs() < 0.05);
    assert!(response
        .confidence_scores
        .contains_key(response.predicted_condition.as_str()));
}

#[tokio::test]
async fn test_predict_rejects_malformed_record() {
    let app = test_app(trained_service()).await;

    let mut missing = serde_json::to_value(&herd()[0].record).unwrap();
    missing.as_object_mut().unwrap().remove("Breed");
    let (status, body) = send(&app.router, post_json("/predict-yield", missing.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["detail"].is_string());

    let mut wrong_type = serde_json::to_value(&herd()[0].record).unwrap();
    wrong_type["Weight"] = Value::String("heavy".to_string());
    let (status, _) = send(
        &app.router,
        post_json("/predict-disease", wrong_type.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_predict_rejects_semantically_invalid_record() {
    let app = test_app(trained_service()).await;
    let mut record = herd()[0].record.clone();
    record.humidity = 140;
    let (status, body) = send(
        &app.router,
        post_json("/predict-yield", serde_json::to_string(&record).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["detail"].as_str().unwrap().contains("Humidity"));
}

#[tokio::test]
async fn test_lookup_unknown_animal_is_404() {
    let app = test_app(untrained_service()).await;
    let (status, body) = send(&app.router, get("/cattle/CATTLE_9999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["detail"].as_str().unwrap().contains("CATTLE_9999"));
}

#[tokio::test]
async fn test_store_then_lookup_without_models() {
    let app = test_app(untrained_service()).await;
    let record = herd()[3].clone();
    let id = record.animal_id().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        post_json("/cattle", serde_json::to_string(&record).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["animal_id"], id.as_str());

    let (status, body) = send(&app.router, get(&format!("/cattle/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let found: LabeledRecord = serde_json::from_slice(&body).unwrap();
    assert_eq!(found.animal_id(), Some(id.as_str()));
    assert_eq!(found.disease_label, record.disease_label);
    assert_eq!(found.record.breed, record.record.breed);
}

#[tokio::test]
async fn test_append_clears_missing_table_state() {
    let app = test_app(untrained_service()).await;
    app.registry
        .set_degraded(components::RECORD_STORE, "record table not found")
        .await;

    let record = herd()[5].clone();
    let (status, _) = send(
        &app.router,
        post_json("/cattle", serde_json::to_string(&record).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        app.registry.status_of(components::RECORD_STORE).await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_append_keeps_unhealthy_store_unhealthy() {
    let app = test_app(trained_service()).await;
    app.registry
        .set_unhealthy(components::RECORD_STORE, "unreadable table")
        .await;

    let record = herd()[6].clone();
    let (status, _) = send(
        &app.router,
        post_json("/cattle", serde_json::to_string(&record).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["components"]["record_store"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_store_rejects_invalid_record() {
    let app = test_app(untrained_service()).await;
    let mut record = herd()[4].clone();
    record.milk_yield = -3.0;
    let (status, _) = send(
        &app.router,
        post_json("/cattle", serde_json::to_string(&record).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let id = record.animal_id().unwrap().to_string();
    let (status, _) = send(&app.router, get(&format!("/cattle/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_models_listing() {
    let app = test_app(trained_service()).await;
    let (status, body) = send(&app.router, get("/models")).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "yield");
    assert_eq!(entries[0]["available"], true);
    assert_eq!(entries[0]["metadata"]["metric_name"], "rmse");
    assert_eq!(entries[1]["kind"], "disease");
    assert_eq!(entries[1]["metadata"]["n_trees"], 15);
}

#[tokio::test]
async fn test_models_listing_reports_missing_bundles() {
    let app = test_app(untrained_service()).await;
    let (_, body) = send(&app.router, get("/models")).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    for entry in json.as_array().unwrap() {
        assert_eq!(entry["available"], false);
        assert!(entry["error"].is_string());
    }
}
