//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use common::{PropertyId, UserId};
use domain::{Investment, Money};
use workflow_store::{InMemoryWorkflowStore, WorkflowStore};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (
    Router,
    Arc<api::routes::workflows::AppState<InMemoryWorkflowStore>>,
    orchestrator::WorkerPool,
) {
    let store = InMemoryWorkflowStore::new();
    let (state, pool) = api::create_default_state(store);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, pool)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

/// Polls an execution until it reaches a terminal status.
async fn await_terminal(app: &Router, execution_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let (status, json) = get_json(app, &format!("/executions/{execution_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let state = json["status"].as_str().unwrap().to_string();
        if state == "completed" || state == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("execution {execution_id} did not reach a terminal status");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _state, _pool) = setup();

    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state, _pool) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_submit_investment_runs_to_completion() {
    let (app, state, _pool) = setup();
    let user_id = UserId::new();
    let property_id = PropertyId::new();

    let (status, json) = post_json(
        &app,
        "/investments",
        serde_json::json!({
            "user_id": user_id.to_string(),
            "property_id": property_id.to_string(),
            "amount_kobo": 5_000_000,
            "payment_method": "card",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "pending");
    let execution_id = json["execution_id"].as_str().unwrap().to_string();

    let terminal = await_terminal(&app, &execution_id).await;
    assert_eq!(terminal["status"], "completed");
    assert_eq!(terminal["workflow_type"], "investment_creation");
    assert_eq!(terminal["current_step_index"], 7);

    // Charge credit and investment debit both landed on the wallet.
    let (status, wallet) = get_json(&app, &format!("/wallets/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["balance_kobo"], 0);
    assert_eq!(wallet["entry_count"], 2);

    assert_eq!(state.payment.charge_count(), 1);
}

#[tokio::test]
async fn test_compliance_rejection_surfaces_in_status() {
    let (app, state, _pool) = setup();
    state.compliance.set_reject("sanctions list match");

    let (status, json) = post_json(
        &app,
        "/investments",
        serde_json::json!({
            "property_id": PropertyId::new().to_string(),
            "amount_kobo": 1_000_000,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let terminal = await_terminal(&app, json["execution_id"].as_str().unwrap()).await;
    assert_eq!(terminal["status"], "failed");
    assert!(
        terminal["failure_reason"]
            .as_str()
            .unwrap()
            .contains("compliance rejected")
    );
    assert_eq!(state.payment.charge_count(), 0);
}

#[tokio::test]
async fn test_distribution_end_to_end() {
    let (app, state, _pool) = setup();
    let property_id = PropertyId::new();

    // Two active investments with a 60/40 split.
    for (i, stake) in [600_000i64, 400_000].iter().enumerate() {
        let investment = Investment::new(
            UserId::new(),
            property_id,
            Money::from_naira(*stake),
            format!("PAY-SEED-{i}"),
        );
        state
            .engine
            .store()
            .insert_investment(&investment)
            .await
            .unwrap();
    }

    let (status, json) = post_json(
        &app,
        "/distributions",
        serde_json::json!({
            "property_id": property_id.to_string(),
            "total_amount_kobo": 100_000_000,
            "distribution_date": "2025-06-30",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let batch_id = json["execution_id"].as_str().unwrap().to_string();

    let terminal = await_terminal(&app, &batch_id).await;
    assert_eq!(terminal["status"], "completed");
    assert_eq!(terminal["workflow_type"], "roi_distribution");

    let (status, batch) = get_json(&app, &format!("/distributions/{batch_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["total_amount_kobo"], 100_000_000);
    let results = batch["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let mut amounts: Vec<i64> = results
        .iter()
        .map(|r| r["amount_kobo"].as_i64().unwrap())
        .collect();
    amounts.sort_unstable();
    assert_eq!(amounts, [40_000_000, 60_000_000]);
    assert!(results.iter().all(|r| r["status"] == "paid"));
}

#[tokio::test]
async fn test_bad_ids_and_missing_resources() {
    let (app, _state, _pool) = setup();

    let (status, _) = post_json(
        &app,
        "/investments",
        serde_json::json!({
            "property_id": "not-a-uuid",
            "amount_kobo": 1_000,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = get_json(&app, &format!("/executions/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, &format!("/distributions/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_interventions_endpoint_empty_by_default() {
    let (app, _state, _pool) = setup();

    let (status, json) = get_json(&app, "/interventions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 0);
}
