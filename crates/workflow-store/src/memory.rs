use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{ExecutionId, InvestmentId, PropertyId, UserId};
use domain::{DistributionBatch, Investment, InvestmentStatus, Money, WalletLedgerEntry};

use crate::error::{Result, StoreError};
use crate::execution::WorkflowExecution;
use crate::intervention::ManualIntervention;
use crate::invocation::{ActivityInvocation, InvocationStatus};
use crate::store::WorkflowStore;

#[derive(Default)]
struct Inner {
    executions: HashMap<ExecutionId, WorkflowExecution>,
    invocations: Vec<ActivityInvocation>,
    investments: HashMap<InvestmentId, Investment>,
    ledger: Vec<WalletLedgerEntry>,
    batches: HashMap<ExecutionId, DistributionBatch>,
    interventions: Vec<ManualIntervention>,
}

/// In-memory workflow store for testing and local development.
///
/// Enforces the same invariants as the PostgreSQL implementation:
/// monotonic cursors, immutable terminal statuses, and at most one
/// succeeded invocation per `(workflow_id, step_name)`.
#[derive(Clone, Default)]
pub struct InMemoryWorkflowStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryWorkflowStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of executions stored.
    pub async fn execution_count(&self) -> usize {
        self.inner.read().await.executions.len()
    }

    /// Returns the total number of invocation rows stored.
    pub async fn invocation_count(&self) -> usize {
        self.inner.read().await.invocations.len()
    }

    /// Returns the total number of investment records stored.
    pub async fn investment_count(&self) -> usize {
        self.inner.read().await.investments.len()
    }

    /// Clears everything.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        let inner = self.inner.read().await;
        Ok(inner.executions.get(&id).cloned())
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .executions
            .get(&execution.id)
            .ok_or(StoreError::ExecutionNotFound(execution.id))?;

        if stored.status.is_terminal() {
            return Err(StoreError::TerminalExecution {
                execution_id: execution.id,
                status: stored.status,
            });
        }
        if execution.current_step_index < stored.current_step_index {
            return Err(StoreError::CursorRegression {
                execution_id: execution.id,
                current: stored.current_step_index,
                attempted: execution.current_step_index,
            });
        }

        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn record_invocation(&self, invocation: &ActivityInvocation) -> Result<()> {
        let mut inner = self.inner.write().await;

        if invocation.status == InvocationStatus::Succeeded {
            let duplicate = inner.invocations.iter().any(|i| {
                i.workflow_id == invocation.workflow_id
                    && i.step_name == invocation.step_name
                    && i.status == InvocationStatus::Succeeded
            });
            if duplicate {
                return Err(StoreError::DuplicateSuccess {
                    execution_id: invocation.workflow_id,
                    step_name: invocation.step_name.clone(),
                });
            }
        }

        inner.invocations.push(invocation.clone());
        Ok(())
    }

    async fn succeeded_invocation(
        &self,
        workflow_id: ExecutionId,
        step_name: &str,
    ) -> Result<Option<ActivityInvocation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .invocations
            .iter()
            .find(|i| {
                i.workflow_id == workflow_id
                    && i.step_name == step_name
                    && i.status == InvocationStatus::Succeeded
            })
            .cloned())
    }

    async fn invocations(&self, workflow_id: ExecutionId) -> Result<Vec<ActivityInvocation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .invocations
            .iter()
            .filter(|i| i.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn insert_investment(&self, investment: &Investment) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.investments.insert(investment.id, investment.clone());
        Ok(())
    }

    async fn get_investment(&self, id: InvestmentId) -> Result<Option<Investment>> {
        let inner = self.inner.read().await;
        Ok(inner.investments.get(&id).cloned())
    }

    async fn update_investment_status(
        &self,
        id: InvestmentId,
        status: InvestmentStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let investment = inner
            .investments
            .get_mut(&id)
            .ok_or(StoreError::InvestmentNotFound(id))?;
        investment.status = status;
        Ok(())
    }

    async fn active_investments_for_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<Investment>> {
        let inner = self.inner.read().await;
        let mut investments: Vec<Investment> = inner
            .investments
            .values()
            .filter(|i| i.property_id == property_id && i.is_active())
            .cloned()
            .collect();
        investments.sort_by_key(|i| i.created_at);
        Ok(investments)
    }

    async fn append_ledger_entry(
        &self,
        user_id: UserId,
        amount: Money,
        reference_id: &str,
    ) -> Result<WalletLedgerEntry> {
        // Balance is derived under the same write lock as the append, so
        // concurrent credit/debit workflows never observe a stale sum.
        let mut inner = self.inner.write().await;
        let balance: Money = inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.amount)
            .sum();
        let balance_after = balance + amount;

        let entry = if amount.is_negative() {
            WalletLedgerEntry::debit(user_id, amount.negated(), reference_id, balance_after)
        } else {
            WalletLedgerEntry::credit(user_id, amount, reference_id, balance_after)
        };
        inner.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn ledger_entries(&self, user_id: UserId) -> Result<Vec<WalletLedgerEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn wallet_balance(&self, user_id: UserId) -> Result<Money> {
        let inner = self.inner.read().await;
        Ok(inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.amount)
            .sum())
    }

    async fn save_batch(&self, batch: &DistributionBatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, id: ExecutionId) -> Result<Option<DistributionBatch>> {
        let inner = self.inner.read().await;
        Ok(inner.batches.get(&id).cloned())
    }

    async fn flag_intervention(&self, intervention: &ManualIntervention) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.interventions.push(intervention.clone());
        Ok(())
    }

    async fn pending_interventions(&self) -> Result<Vec<ManualIntervention>> {
        let inner = self.inner.read().await;
        Ok(inner.interventions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::WorkflowType;

    fn make_execution() -> WorkflowExecution {
        WorkflowExecution::new(WorkflowType::InvestmentCreation, serde_json::json!({}))
    }

    #[tokio::test]
    async fn create_and_load_execution() {
        let store = InMemoryWorkflowStore::new();
        let exec = make_execution();

        store.create_execution(&exec).await.unwrap();
        let loaded = store.get_execution(exec.id).await.unwrap().unwrap();
        assert_eq!(loaded, exec);
        assert_eq!(store.execution_count().await, 1);
    }

    #[tokio::test]
    async fn update_rejects_terminal_execution() {
        let store = InMemoryWorkflowStore::new();
        let mut exec = make_execution();
        store.create_execution(&exec).await.unwrap();

        exec.start().unwrap();
        exec.complete().unwrap();
        store.update_execution(&exec).await.unwrap();

        // A stale copy cannot mutate the archived record.
        let stale = make_execution();
        let mut stale = WorkflowExecution { id: exec.id, ..stale };
        stale.start().unwrap();
        let result = store.update_execution(&stale).await;
        assert!(matches!(result, Err(StoreError::TerminalExecution { .. })));
    }

    #[tokio::test]
    async fn update_rejects_cursor_regression() {
        let store = InMemoryWorkflowStore::new();
        let mut exec = make_execution();
        store.create_execution(&exec).await.unwrap();

        exec.start().unwrap();
        exec.advance_cursor(4).unwrap();
        store.update_execution(&exec).await.unwrap();

        let mut stale = store.get_execution(exec.id).await.unwrap().unwrap();
        stale.current_step_index = 2;
        let result = store.update_execution(&stale).await;
        assert!(matches!(result, Err(StoreError::CursorRegression { .. })));
    }

    #[tokio::test]
    async fn at_most_one_succeeded_invocation_per_step() {
        let store = InMemoryWorkflowStore::new();
        let workflow_id = ExecutionId::new();

        store
            .record_invocation(&ActivityInvocation::failed(
                workflow_id,
                "process_payment",
                1,
                "gateway timeout",
            ))
            .await
            .unwrap();
        store
            .record_invocation(&ActivityInvocation::succeeded(
                workflow_id,
                "process_payment",
                2,
                serde_json::json!({"payment_reference": "PAY-1"}),
            ))
            .await
            .unwrap();

        let duplicate = store
            .record_invocation(&ActivityInvocation::succeeded(
                workflow_id,
                "process_payment",
                3,
                serde_json::json!({"payment_reference": "PAY-2"}),
            ))
            .await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateSuccess { .. })));

        let succeeded = store
            .succeeded_invocation(workflow_id, "process_payment")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(succeeded.attempt_number, 2);
        assert_eq!(store.invocation_count().await, 2);
    }

    #[tokio::test]
    async fn ledger_balance_is_running_sum() {
        let store = InMemoryWorkflowStore::new();
        let user = UserId::new();

        let e1 = store
            .append_ledger_entry(user, Money::from_kobo(1000), "PAY-1")
            .await
            .unwrap();
        assert_eq!(e1.balance_after, Money::from_kobo(1000));

        let e2 = store
            .append_ledger_entry(user, Money::from_kobo(-400), "INV-1")
            .await
            .unwrap();
        assert_eq!(e2.balance_after, Money::from_kobo(600));

        assert_eq!(store.wallet_balance(user).await.unwrap(), Money::from_kobo(600));
        assert_eq!(store.ledger_entries(user).await.unwrap().len(), 2);

        // Other users are unaffected.
        assert_eq!(
            store.wallet_balance(UserId::new()).await.unwrap(),
            Money::zero()
        );
    }

    #[tokio::test]
    async fn concurrent_ledger_appends_conserve_the_sum() {
        let store = InMemoryWorkflowStore::new();
        let user = UserId::new();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_ledger_entry(user, Money::from_kobo(10), &format!("ref-{i}"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.wallet_balance(user).await.unwrap(), Money::from_kobo(500));
    }

    #[tokio::test]
    async fn active_investments_filtering() {
        let store = InMemoryWorkflowStore::new();
        let property_id = PropertyId::new();

        let active = Investment::new(
            UserId::new(),
            property_id,
            Money::from_naira(1000),
            "PAY-1",
        );
        let mut failed = Investment::new(
            UserId::new(),
            property_id,
            Money::from_naira(2000),
            "PAY-2",
        );
        failed.status = InvestmentStatus::Failed;
        let other_property = Investment::new(
            UserId::new(),
            PropertyId::new(),
            Money::from_naira(3000),
            "PAY-3",
        );

        store.insert_investment(&active).await.unwrap();
        store.insert_investment(&failed).await.unwrap();
        store.insert_investment(&other_property).await.unwrap();

        let found = store
            .active_investments_for_property(property_id)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, active.id);
    }

    #[tokio::test]
    async fn investment_status_update() {
        let store = InMemoryWorkflowStore::new();
        let investment = Investment::new(
            UserId::new(),
            PropertyId::new(),
            Money::from_naira(500),
            "PAY-9",
        );
        store.insert_investment(&investment).await.unwrap();

        store
            .update_investment_status(investment.id, InvestmentStatus::Failed)
            .await
            .unwrap();
        let loaded = store.get_investment(investment.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, InvestmentStatus::Failed);

        let missing = store
            .update_investment_status(InvestmentId::new(), InvestmentStatus::Failed)
            .await;
        assert!(matches!(missing, Err(StoreError::InvestmentNotFound(_))));
    }

    #[tokio::test]
    async fn interventions_are_listed_in_order() {
        let store = InMemoryWorkflowStore::new();
        let first = ManualIntervention::new(ExecutionId::new(), "refund_payment", "exhausted");
        let second = ManualIntervention::new(ExecutionId::new(), "credit_wallet", "ledger down");

        store.flag_intervention(&first).await.unwrap();
        store.flag_intervention(&second).await.unwrap();

        let pending = store.pending_interventions().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].step_name, "refund_payment");
        assert_eq!(pending[1].step_name, "credit_wallet");
    }
}
