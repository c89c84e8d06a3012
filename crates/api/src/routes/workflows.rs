//! Workflow submission and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{NaiveDate, Utc};
use common::{ExecutionId, PropertyId, UserId};
use domain::{Money, PaymentMethod};
use orchestrator::{
    DistributionRequest, InMemoryComplianceChecker, InMemoryNotificationService,
    InMemoryPaymentProcessor, InMemoryShareAllocator, InvestmentRequest, TaskQueue, WorkflowEngine,
};
use serde::{Deserialize, Serialize};
use workflow_store::{WorkflowExecution, WorkflowStore};

use crate::error::ApiError;

/// The engine as wired by `create_default_state`: generic store, in-memory
/// collaborators standing in for the external gateways.
pub type AppEngine<S> = WorkflowEngine<
    S,
    InMemoryComplianceChecker,
    InMemoryPaymentProcessor,
    InMemoryNotificationService,
    InMemoryShareAllocator,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: WorkflowStore + Clone> {
    pub engine: Arc<AppEngine<S>>,
    pub queue: TaskQueue,
    pub compliance: InMemoryComplianceChecker,
    pub payment: InMemoryPaymentProcessor,
    pub notifications: InMemoryNotificationService,
    pub shares: InMemoryShareAllocator,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SubmitInvestmentRequest {
    /// Omit to have the platform mint a new investor id.
    pub user_id: Option<String>,
    pub property_id: String,
    pub amount_kobo: i64,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Deserialize)]
pub struct SubmitDistributionRequest {
    pub property_id: String,
    pub total_amount_kobo: i64,
    /// Defaults to today.
    pub distribution_date: Option<NaiveDate>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SubmitResponse {
    pub execution_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct ExecutionResponse {
    pub execution_id: String,
    pub workflow_type: String,
    pub status: String,
    pub current_step_index: u32,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResultResponse {
    pub investment_id: String,
    pub user_id: String,
    pub amount_kobo: i64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub property_id: String,
    pub total_amount_kobo: i64,
    pub distribution_date: NaiveDate,
    pub results: Vec<BatchResultResponse>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub balance_kobo: i64,
    pub entry_count: usize,
}

#[derive(Serialize)]
pub struct InterventionResponse {
    pub execution_id: String,
    pub step_name: String,
    pub reason: String,
    pub flagged_at: String,
}

impl From<WorkflowExecution> for ExecutionResponse {
    fn from(execution: WorkflowExecution) -> Self {
        Self {
            execution_id: execution.id.to_string(),
            workflow_type: execution.workflow_type.to_string(),
            status: execution.status.to_string(),
            current_step_index: execution.current_step_index,
            failure_reason: execution.failure_reason,
            created_at: execution.created_at.to_rfc3339(),
            completed_at: execution.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

// -- Handlers --

/// POST /investments — submit an investment-creation workflow.
///
/// Fire-and-forget: the execution is durable and enqueued before this
/// returns 202 with the handle to poll.
#[tracing::instrument(skip(state, req))]
pub async fn submit_investment<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SubmitInvestmentRequest>,
) -> Result<(axum::http::StatusCode, Json<SubmitResponse>), ApiError> {
    let user_id = match &req.user_id {
        Some(raw) => UserId::from_uuid(parse_uuid(raw, "user_id")?),
        None => UserId::new(),
    };
    let property_id = PropertyId::from_uuid(parse_uuid(&req.property_id, "property_id")?);

    let request = InvestmentRequest {
        user_id,
        property_id,
        amount: Money::from_kobo(req.amount_kobo),
        payment_method: req.payment_method.unwrap_or(PaymentMethod::Card),
    };

    let execution_id = state.engine.submit_investment(request).await?;
    state.queue.dispatch(execution_id).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(SubmitResponse {
            execution_id: execution_id.to_string(),
            status: "pending".to_string(),
        }),
    ))
}

/// POST /distributions — submit an ROI-distribution workflow.
#[tracing::instrument(skip(state, req))]
pub async fn submit_distribution<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SubmitDistributionRequest>,
) -> Result<(axum::http::StatusCode, Json<SubmitResponse>), ApiError> {
    let property_id = PropertyId::from_uuid(parse_uuid(&req.property_id, "property_id")?);

    let request = DistributionRequest {
        property_id,
        total_amount: Money::from_kobo(req.total_amount_kobo),
        distribution_date: req
            .distribution_date
            .unwrap_or_else(|| Utc::now().date_naive()),
    };

    let execution_id = state.engine.submit_distribution(request).await?;
    state.queue.dispatch(execution_id).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(SubmitResponse {
            execution_id: execution_id.to_string(),
            status: "pending".to_string(),
        }),
    ))
}

/// GET /executions/:id — poll a workflow execution.
#[tracing::instrument(skip(state))]
pub async fn get_execution<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let execution_id = ExecutionId::from_uuid(parse_uuid(&id, "execution id")?);

    let execution = state
        .engine
        .get_status(execution_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution {id} not found")))?;

    Ok(Json(execution.into()))
}

/// GET /distributions/:id — load a distribution batch with its results.
#[tracing::instrument(skip(state))]
pub async fn get_batch<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch_id = ExecutionId::from_uuid(parse_uuid(&id, "batch id")?);

    let batch = state
        .engine
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Distribution batch {id} not found")))?;

    let results = batch
        .results
        .iter()
        .map(|r| BatchResultResponse {
            investment_id: r.investment_id.to_string(),
            user_id: r.user_id.to_string(),
            amount_kobo: r.amount.kobo(),
            status: r.status.to_string(),
            payment_reference: r.payment_reference.clone(),
            failure_reason: r.failure_reason.clone(),
        })
        .collect();

    Ok(Json(BatchResponse {
        batch_id: batch.id.to_string(),
        property_id: batch.property_id.to_string(),
        total_amount_kobo: batch.total_amount.kobo(),
        distribution_date: batch.distribution_date,
        results,
    }))
}

/// GET /wallets/:user_id — derived wallet balance from the ledger.
#[tracing::instrument(skip(state))]
pub async fn get_wallet<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<WalletResponse>, ApiError> {
    let user_id = UserId::from_uuid(parse_uuid(&user_id, "user id")?);

    let balance = state.engine.store().wallet_balance(user_id).await?;
    let entries = state.engine.store().ledger_entries(user_id).await?;

    Ok(Json(WalletResponse {
        user_id: user_id.to_string(),
        balance_kobo: balance.kobo(),
        entry_count: entries.len(),
    }))
}

/// GET /interventions — executions awaiting an operator.
#[tracing::instrument(skip(state))]
pub async fn list_interventions<S: WorkflowStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<InterventionResponse>>, ApiError> {
    let interventions = state.engine.store().pending_interventions().await?;

    Ok(Json(
        interventions
            .into_iter()
            .map(|i| InterventionResponse {
                execution_id: i.execution_id.to_string(),
                step_name: i.step_name,
                reason: i.reason,
                flagged_at: i.flagged_at.to_rfc3339(),
            })
            .collect(),
    ))
}

fn parse_uuid(raw: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
