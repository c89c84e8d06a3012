//! Durable workflow orchestration for investment operations.
//!
//! Two workflow shapes run on top of the same engine:
//!
//! 1. **Investment creation** — a linear compensating saga:
//!    verify compliance → process payment → create investment record →
//!    record ledger transaction → debit wallet → distribute shares →
//!    notify investor. The payment step is irreversible; if a later step
//!    fails permanently, the charge is refunded before the execution is
//!    marked failed.
//! 2. **ROI distribution** — a fan-out batch: each investor's fixed share
//!    is computed once at batch start, then one independent payout
//!    sub-saga runs per investor. A failed payout is recorded and never
//!    affects the rest of the batch.
//!
//! Progress is persisted after every step (status + step cursor) and every
//! activity attempt is logged with a deterministic idempotency key, so a
//! re-delivered execution resumes where it stopped instead of re-running
//! side effects.

pub mod activity;
pub mod collaborators;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod investment;
pub mod queue;
pub mod step;

pub use activity::{ActivityError, ActivityExecutor, RetryPolicy};
pub use collaborators::{
    ChargeReceipt, ComplianceChecker, ComplianceDecision, InMemoryComplianceChecker,
    InMemoryNotificationService, InMemoryPaymentProcessor, InMemoryShareAllocator,
    NotificationService, PaymentProcessor, RefundReceipt, ShareAllocation, ShareAllocator,
};
pub use config::OrchestratorConfig;
pub use distribution::DistributionRequest;
pub use engine::{ExecutionRunner, WorkflowEngine};
pub use error::OrchestratorError;
pub use investment::InvestmentRequest;
pub use queue::{TaskQueue, WorkerPool};
pub use step::{InvestmentStep, PayoutStep};
