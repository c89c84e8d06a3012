//! Orchestrator error types.

use thiserror::Error;

use common::ExecutionId;
use domain::DomainError;
use workflow_store::StoreError;

/// Errors that can occur while orchestrating workflows.
///
/// Step failures are not represented here: they are recorded on the
/// execution and surfaced through its status, per the propagation policy.
/// These errors are for infrastructure problems the engine itself hits.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The execution was not found in the store.
    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// The submitted request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The task queue has shut down and cannot accept work.
    #[error("Task queue is closed")]
    QueueClosed,

    /// A step that earlier steps guarantee has run left no logged result.
    #[error("Execution {execution_id} has no logged result for step '{step}'")]
    MissingStepResult {
        execution_id: ExecutionId,
        step: String,
    },

    /// Workflow store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
