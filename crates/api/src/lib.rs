//! HTTP trigger surface for the investment workflow engine.
//!
//! Exposes the asynchronous submission endpoints (investments, ROI
//! distributions), status polling, wallet balances and the
//! manual-intervention queue, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    InMemoryComplianceChecker, InMemoryNotificationService, InMemoryPaymentProcessor,
    InMemoryShareAllocator, OrchestratorConfig, WorkerPool, WorkflowEngine,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow_store::WorkflowStore;

use routes::workflows::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: WorkflowStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/investments", post(routes::workflows::submit_investment::<S>))
        .route(
            "/distributions",
            post(routes::workflows::submit_distribution::<S>),
        )
        .route(
            "/distributions/{id}",
            get(routes::workflows::get_batch::<S>),
        )
        .route(
            "/executions/{id}",
            get(routes::workflows::get_execution::<S>),
        )
        .route("/wallets/{user_id}", get(routes::workflows::get_wallet::<S>))
        .route(
            "/interventions",
            get(routes::workflows::list_interventions::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory collaborators and
/// a running worker pool.
///
/// The returned pool drains and stops once the state (and every queue
/// clone inside it) is dropped.
pub fn create_default_state<S: WorkflowStore + Clone + 'static>(
    store: S,
) -> (Arc<AppState<S>>, WorkerPool) {
    let compliance = InMemoryComplianceChecker::new();
    let payment = InMemoryPaymentProcessor::new();
    let notifications = InMemoryNotificationService::new();
    let shares = InMemoryShareAllocator::new();
    let config = OrchestratorConfig::from_env();

    let engine = Arc::new(WorkflowEngine::new(
        store,
        compliance.clone(),
        payment.clone(),
        notifications.clone(),
        shares.clone(),
        config.clone(),
    ));

    let (queue, pool) = WorkerPool::start(
        Arc::clone(&engine),
        config.worker_count,
        config.queue_capacity,
    );

    let state = Arc::new(AppState {
        engine,
        queue,
        compliance,
        payment,
        notifications,
        shares,
    });

    (state, pool)
}
