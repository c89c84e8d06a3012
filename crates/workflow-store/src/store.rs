use async_trait::async_trait;

use common::{ExecutionId, InvestmentId, PropertyId, UserId};
use domain::{DistributionBatch, Investment, InvestmentStatus, Money, WalletLedgerEntry};

use crate::error::Result;
use crate::execution::WorkflowExecution;
use crate::intervention::ManualIntervention;
use crate::invocation::ActivityInvocation;

/// Core trait for workflow state persistence.
///
/// All mutations within one method call are atomic: a step's commit either
/// lands fully or not at all. Implementations must be thread-safe
/// (Send + Sync) — many workers read and write concurrently, and the
/// ledger and invocation log in particular see concurrent appends.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persists a new execution.
    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()>;

    /// Loads an execution by id.
    ///
    /// Returns None if the execution doesn't exist.
    async fn get_execution(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>>;

    /// Persists an updated execution (status, cursor, failure reason).
    ///
    /// Fails with `TerminalExecution` if the stored copy is already
    /// terminal, and with `CursorRegression` if the update would move the
    /// step cursor backwards.
    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<()>;

    /// Appends an activity invocation attempt to the log.
    ///
    /// Fails with `DuplicateSuccess` if a succeeded row already exists for
    /// the same `(workflow_id, step_name)`.
    async fn record_invocation(&self, invocation: &ActivityInvocation) -> Result<()>;

    /// Returns the succeeded invocation for a step, if any.
    async fn succeeded_invocation(
        &self,
        workflow_id: ExecutionId,
        step_name: &str,
    ) -> Result<Option<ActivityInvocation>>;

    /// Returns all invocation attempts for an execution, oldest first.
    async fn invocations(&self, workflow_id: ExecutionId) -> Result<Vec<ActivityInvocation>>;

    /// Persists a new investment record.
    async fn insert_investment(&self, investment: &Investment) -> Result<()>;

    /// Loads an investment by id.
    async fn get_investment(&self, id: InvestmentId) -> Result<Option<Investment>>;

    /// Updates the status of an existing investment.
    async fn update_investment_status(
        &self,
        id: InvestmentId,
        status: InvestmentStatus,
    ) -> Result<()>;

    /// Returns all active investments for a property.
    async fn active_investments_for_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<Investment>>;

    /// Appends a signed ledger entry for a user and returns it with
    /// `balance_after` computed from the running sum.
    ///
    /// The append and the sum are atomic with respect to concurrent
    /// appends for the same user.
    async fn append_ledger_entry(
        &self,
        user_id: UserId,
        amount: Money,
        reference_id: &str,
    ) -> Result<WalletLedgerEntry>;

    /// Returns all ledger entries for a user, oldest first.
    async fn ledger_entries(&self, user_id: UserId) -> Result<Vec<WalletLedgerEntry>>;

    /// Returns the user's balance as the sum of their ledger entries.
    async fn wallet_balance(&self, user_id: UserId) -> Result<Money>;

    /// Persists a distribution batch, replacing any existing version.
    async fn save_batch(&self, batch: &DistributionBatch) -> Result<()>;

    /// Loads a distribution batch by its execution id.
    async fn get_batch(&self, id: ExecutionId) -> Result<Option<DistributionBatch>>;

    /// Flags an execution step for manual operator intervention.
    async fn flag_intervention(&self, intervention: &ManualIntervention) -> Result<()>;

    /// Returns all flagged interventions, oldest first.
    async fn pending_interventions(&self) -> Result<Vec<ManualIntervention>>;
}
