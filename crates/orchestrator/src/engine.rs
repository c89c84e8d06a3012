//! The workflow engine: submission, status polling and execution dispatch.

use async_trait::async_trait;

use common::ExecutionId;
use domain::DistributionBatch;
use workflow_store::{WorkflowExecution, WorkflowStore, WorkflowType};

use crate::activity::ActivityExecutor;
use crate::collaborators::{
    ComplianceChecker, NotificationService, PaymentProcessor, ShareAllocator,
};
use crate::config::OrchestratorConfig;
use crate::distribution::DistributionRequest;
use crate::error::{OrchestratorError, Result};
use crate::investment::InvestmentRequest;

/// Executes workflow instances against the store and collaborators.
///
/// The engine is generic over the store and the four collaborator seams,
/// so production wiring and tests differ only in what they plug in.
/// Submission is fire-and-forget: `submit_*` persists a pending execution
/// and returns its id immediately; a worker later drives it through
/// [`run_execution`](Self::run_execution). Re-delivering an execution is
/// always safe — terminal executions are skipped and non-terminal ones
/// resume at their persisted step cursor.
pub struct WorkflowEngine<S, C, P, N, A>
where
    S: WorkflowStore + Clone,
    C: ComplianceChecker,
    P: PaymentProcessor,
    N: NotificationService,
    A: ShareAllocator,
{
    pub(crate) store: S,
    pub(crate) executor: ActivityExecutor<S>,
    pub(crate) compliance: C,
    pub(crate) payment: P,
    pub(crate) notifications: N,
    pub(crate) shares: A,
    pub(crate) config: OrchestratorConfig,
}

impl<S, C, P, N, A> WorkflowEngine<S, C, P, N, A>
where
    S: WorkflowStore + Clone,
    C: ComplianceChecker,
    P: PaymentProcessor,
    N: NotificationService,
    A: ShareAllocator,
{
    /// Creates a new engine.
    pub fn new(
        store: S,
        compliance: C,
        payment: P,
        notifications: N,
        shares: A,
        config: OrchestratorConfig,
    ) -> Self {
        let executor = ActivityExecutor::new(store.clone());
        Self {
            store,
            executor,
            compliance,
            payment,
            notifications,
            shares,
            config,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Persists a pending investment-creation execution and returns its id.
    ///
    /// The execution is durable before this returns; the caller hands the
    /// id to the task queue and polls [`get_status`](Self::get_status).
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn submit_investment(&self, request: InvestmentRequest) -> Result<ExecutionId> {
        if !request.amount.is_positive() {
            return Err(OrchestratorError::InvalidRequest(format!(
                "investment amount must be positive, got {}",
                request.amount
            )));
        }

        let execution = WorkflowExecution::new(
            WorkflowType::InvestmentCreation,
            serde_json::to_value(&request)?,
        );
        self.store.create_execution(&execution).await?;

        metrics::counter!("workflow_submissions_total", "workflow_type" => "investment_creation")
            .increment(1);
        tracing::info!(execution_id = %execution.id, "investment execution submitted");
        Ok(execution.id)
    }

    /// Persists a pending ROI-distribution execution and returns its id,
    /// which is also the id of the resulting batch.
    #[tracing::instrument(skip(self, request), fields(property_id = %request.property_id))]
    pub async fn submit_distribution(&self, request: DistributionRequest) -> Result<ExecutionId> {
        if !request.total_amount.is_positive() {
            return Err(OrchestratorError::InvalidRequest(format!(
                "distribution total must be positive, got {}",
                request.total_amount
            )));
        }

        let execution = WorkflowExecution::new(
            WorkflowType::RoiDistribution,
            serde_json::to_value(&request)?,
        );
        self.store.create_execution(&execution).await?;

        metrics::counter!("workflow_submissions_total", "workflow_type" => "roi_distribution")
            .increment(1);
        tracing::info!(execution_id = %execution.id, "distribution execution submitted");
        Ok(execution.id)
    }

    /// Loads an execution for status polling.
    pub async fn get_status(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        Ok(self.store.get_execution(id).await?)
    }

    /// Loads a distribution batch by its execution id.
    pub async fn get_batch(&self, id: ExecutionId) -> Result<Option<DistributionBatch>> {
        Ok(self.store.get_batch(id).await?)
    }

    /// Runs (or resumes) one execution to a terminal state.
    ///
    /// This is the worker entry point. Step failures are recorded on the
    /// execution and do not surface as errors here; an `Err` means the
    /// engine itself could not make progress (store unavailable, unknown
    /// id) and the delivery should be retried.
    #[tracing::instrument(skip(self))]
    pub async fn run_execution(&self, id: ExecutionId) -> Result<WorkflowExecution> {
        let execution = self
            .store
            .get_execution(id)
            .await?
            .ok_or(OrchestratorError::ExecutionNotFound(id))?;

        if execution.status.is_terminal() {
            tracing::debug!(execution_id = %id, status = %execution.status, "already terminal, skipping");
            return Ok(execution);
        }

        let started = std::time::Instant::now();
        let result = match execution.workflow_type {
            WorkflowType::InvestmentCreation => self.run_investment(execution).await,
            WorkflowType::RoiDistribution => self.run_distribution(execution).await,
        };
        metrics::histogram!("workflow_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }
}

/// Worker-facing view of the engine.
///
/// The worker pool holds the runner behind this trait so it does not carry
/// the engine's five type parameters around.
#[async_trait]
pub trait ExecutionRunner: Send + Sync {
    /// Runs one execution to a terminal state.
    async fn run(&self, id: ExecutionId) -> Result<()>;
}

#[async_trait]
impl<S, C, P, N, A> ExecutionRunner for WorkflowEngine<S, C, P, N, A>
where
    S: WorkflowStore + Clone,
    C: ComplianceChecker,
    P: PaymentProcessor,
    N: NotificationService,
    A: ShareAllocator,
{
    async fn run(&self, id: ExecutionId) -> Result<()> {
        self.run_execution(id).await.map(|_| ())
    }
}
