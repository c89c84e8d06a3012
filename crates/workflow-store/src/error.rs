use thiserror::Error;

use common::{ExecutionId, InvestmentId};

use crate::execution::WorkflowStatus;

/// Errors that can occur when interacting with the workflow store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The execution was not found in the store.
    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// The investment was not found in the store.
    #[error("Investment not found: {0}")]
    InvestmentNotFound(InvestmentId),

    /// The distribution batch was not found in the store.
    #[error("Distribution batch not found: {0}")]
    BatchNotFound(ExecutionId),

    /// An update was attempted on an execution in a terminal status.
    #[error("Execution {execution_id} is terminal ({status}) and cannot change")]
    TerminalExecution {
        execution_id: ExecutionId,
        status: WorkflowStatus,
    },

    /// An update tried to move the step cursor backwards.
    #[error("Cursor for execution {execution_id} cannot move from {current} back to {attempted}")]
    CursorRegression {
        execution_id: ExecutionId,
        current: u32,
        attempted: u32,
    },

    /// A second succeeded invocation was recorded for the same step.
    #[error("Step '{step_name}' of execution {execution_id} already has a succeeded invocation")]
    DuplicateSuccess {
        execution_id: ExecutionId,
        step_name: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for workflow store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
