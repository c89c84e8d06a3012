//! Durable workflow state for the orchestration subsystem.
//!
//! The engine persists its progress here: one [`WorkflowExecution`] row per
//! workflow instance (status + step cursor), one [`ActivityInvocation`] row
//! per activity attempt (the idempotency-keyed replay log), plus the
//! business records the workflows produce — investments, the append-only
//! wallet ledger and distribution batches.
//!
//! Two implementations of [`WorkflowStore`] are provided: an in-memory
//! store for tests and local development, and a PostgreSQL store for
//! production.

pub mod error;
pub mod execution;
pub mod intervention;
pub mod invocation;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{ExecutionId, InvestmentId, PropertyId, UserId};
pub use error::{Result, StoreError};
pub use execution::{WorkflowExecution, WorkflowStatus, WorkflowType};
pub use intervention::ManualIntervention;
pub use invocation::{ActivityInvocation, InvocationStatus, idempotency_key};
pub use memory::InMemoryWorkflowStore;
pub use postgres::PostgresWorkflowStore;
pub use store::WorkflowStore;
