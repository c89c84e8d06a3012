//! ROI distribution batch coordinator.
//!
//! One batch fans out into one payout sub-saga per investor. Shares are
//! computed exactly once, in the prepare step, and replayed from the
//! invocation log on resume — a fourth investment arriving mid-run never
//! changes an in-flight batch. Payout failures are isolated: each is
//! recorded on its own `DistributionResult` and the rest of the batch
//! proceeds untouched.

use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use common::{ExecutionId, PropertyId};
use domain::{
    DistributionBatch, DistributionResult, DomainError, Money, PaymentMethod, PlannedPayout,
    allocate_shares,
};
use workflow_store::{ManualIntervention, WorkflowExecution, WorkflowStatus, WorkflowStore};

use crate::activity::ActivityError;
use crate::collaborators::{
    ChargeReceipt, ComplianceChecker, NotificationService, PaymentProcessor, ShareAllocator,
};
use crate::engine::WorkflowEngine;
use crate::error::Result;
use crate::investment::{LedgerEntryRecorded, store_failure};
use crate::step::PayoutStep;

/// Request payload of an ROI-distribution execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub property_id: PropertyId,
    pub total_amount: Money,
    pub distribution_date: NaiveDate,
}

/// Logged result of the prepare step: the fixed payout plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DistributionPlan {
    payouts: Vec<PlannedPayout>,
}

/// Logged result of a payout's record-transaction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayoutRecorded {
    payment_reference: String,
    amount: Money,
}

/// Step names of the batch workflow itself (the payout sub-steps are
/// scoped per investment, see [`PayoutStep::scoped_name`]).
const STEP_PREPARE: &str = "prepare_distribution";

/// Cursor positions of the batch workflow.
const CURSOR_PREPARED: u32 = 1;
const CURSOR_SETTLED: u32 = 2;

impl<S, C, P, N, A> WorkflowEngine<S, C, P, N, A>
where
    S: WorkflowStore + Clone,
    C: ComplianceChecker,
    P: PaymentProcessor,
    N: NotificationService,
    A: ShareAllocator,
{
    /// Runs (or resumes) an ROI-distribution execution.
    pub(crate) async fn run_distribution(
        &self,
        mut execution: WorkflowExecution,
    ) -> Result<WorkflowExecution> {
        let request: DistributionRequest = serde_json::from_value(execution.input.clone())?;

        if execution.status == WorkflowStatus::Pending {
            execution.start()?;
            self.store.update_execution(&execution).await?;
        }

        // Step 1: fix the plan. Runs once; resume replays the logged plan.
        if execution.current_step_index < CURSOR_PREPARED {
            tracing::info!(execution_id = %execution.id, step = STEP_PREPARE, "batch step started");
            let prepared = self.prepare_distribution(&execution, &request).await?;
            match prepared {
                Ok(plan) => {
                    tracing::info!(
                        execution_id = %execution.id,
                        investors = plan.payouts.len(),
                        total = %request.total_amount,
                        "distribution plan fixed"
                    );
                    execution.advance_cursor(CURSOR_PREPARED)?;
                    self.store.update_execution(&execution).await?;
                }
                Err(err) => {
                    execution.fail(format!("step '{STEP_PREPARE}' failed: {}", err.reason()))?;
                    self.store.update_execution(&execution).await?;
                    metrics::counter!("workflow_failed").increment(1);
                    return Ok(execution);
                }
            }
        }

        // Step 2: fan out one sub-saga per investor and wait for all of
        // them to reach a terminal result.
        if execution.current_step_index < CURSOR_SETTLED {
            let plan: DistributionPlan = self.require_logged(execution.id, STEP_PREPARE).await?;

            let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_payouts.max(1)));
            let payouts = plan.payouts.iter().map(|payout| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    match semaphore.acquire().await {
                        Ok(_permit) => self.run_payout(execution.id, payout).await,
                        // The semaphore lives for the whole join; closure
                        // here means the runtime is tearing down.
                        Err(_) => DistributionResult::pending(payout)
                            .failed("payout scheduling unavailable"),
                    }
                }
            });
            let results = join_all(payouts).await;

            let failed = results
                .iter()
                .filter(|r| r.status == domain::PayoutStatus::Failed)
                .count();
            let batch = DistributionBatch {
                id: execution.id,
                property_id: request.property_id,
                total_amount: request.total_amount,
                distribution_date: request.distribution_date,
                results,
            };
            self.store.save_batch(&batch).await?;

            tracing::info!(
                execution_id = %execution.id,
                paid = batch.results.len() - failed,
                failed,
                paid_total = %batch.paid_total(),
                "distribution batch settled"
            );
            execution.advance_cursor(CURSOR_SETTLED)?;
            self.store.update_execution(&execution).await?;
        }

        execution.complete()?;
        self.store.update_execution(&execution).await?;
        metrics::counter!("workflow_completed").increment(1);
        Ok(execution)
    }

    /// Computes the fixed shares and persists the batch skeleton.
    async fn prepare_distribution(
        &self,
        execution: &WorkflowExecution,
        request: &DistributionRequest,
    ) -> Result<std::result::Result<DistributionPlan, ActivityError>> {
        self.executor
            .invoke(
                execution.id,
                STEP_PREPARE,
                self.config.activity_retry,
                |_key| {
                    let store = self.store.clone();
                    let request = request.clone();
                    let batch_id = execution.id;
                    async move {
                        let investments = store
                            .active_investments_for_property(request.property_id)
                            .await
                            .map_err(store_failure)?;

                        let payouts = allocate_shares(request.total_amount, &investments)
                            .map_err(|err| match err {
                                // An empty pool is a fact about the data,
                                // not a retryable fault.
                                DomainError::NoActiveInvestments(_) => {
                                    ActivityError::Permanent(err.to_string())
                                }
                                DomainError::InvalidAmount(_) => {
                                    ActivityError::Permanent(err.to_string())
                                }
                            })?;

                        let batch = DistributionBatch::new(
                            batch_id,
                            request.property_id,
                            request.total_amount,
                            request.distribution_date,
                            &payouts,
                        );
                        store.save_batch(&batch).await.map_err(store_failure)?;

                        Ok(DistributionPlan { payouts })
                    }
                },
            )
            .await
    }

    /// Runs one investor's payout sub-saga to a terminal result.
    ///
    /// Never propagates failure: whatever happens is captured on the
    /// returned [`DistributionResult`], so one investor's gateway decline
    /// cannot disturb the rest of the batch.
    async fn run_payout(
        &self,
        execution_id: ExecutionId,
        payout: &PlannedPayout,
    ) -> DistributionResult {
        let result = DistributionResult::pending(payout);
        let policy = self.config.activity_retry;

        // Disburse through the gateway.
        let charge_step = PayoutStep::ProcessPayment.scoped_name(payout.investment_id);
        let charged: std::result::Result<ChargeReceipt, ActivityError> = match self
            .executor
            .invoke(execution_id, &charge_step, policy, |key| async move {
                self.payment
                    .charge(
                        &key,
                        payout.user_id,
                        payout.amount,
                        PaymentMethod::BankTransfer,
                    )
                    .await
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(%execution_id, investment_id = %payout.investment_id, error = %err, "payout halted by store failure");
                return result.failed(err.to_string());
            }
        };

        let receipt = match charged {
            Ok(receipt) => receipt,
            Err(err) => {
                metrics::counter!("payouts_failed_total").increment(1);
                tracing::warn!(
                    %execution_id,
                    investment_id = %payout.investment_id,
                    reason = err.reason(),
                    "payout payment failed"
                );
                return result.failed(err.reason().to_string());
            }
        };

        // Money moved; from here on a failure is flagged for an operator
        // rather than silently dropped.
        if let Err(reason) = self.settle_payout(execution_id, payout, &receipt).await {
            self.flag_payout(execution_id, payout, &receipt, &reason).await;
            metrics::counter!("payouts_failed_total").increment(1);
            return result.failed(reason);
        }

        // Best-effort notification.
        let notify_step = PayoutStep::NotifyInvestor.scoped_name(payout.investment_id);
        let notified: Result<std::result::Result<(), ActivityError>> = self
            .executor
            .invoke(execution_id, &notify_step, policy, |_key| {
                let payload = serde_json::json!({
                    "batch_id": execution_id,
                    "amount_kobo": payout.amount.kobo(),
                    "payment_reference": receipt.payment_reference,
                });
                async move {
                    self.notifications
                        .send(payout.user_id, "roi_paid", payload)
                        .await
                }
            })
            .await;
        match notified {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    %execution_id,
                    investment_id = %payout.investment_id,
                    reason = err.reason(),
                    "payout notification failed"
                );
                metrics::counter!("notifications_failed_total").increment(1);
            }
            Err(err) => {
                tracing::warn!(%execution_id, error = %err, "payout notification not logged");
            }
        }

        result.paid(receipt.payment_reference)
    }

    /// Records the payout transaction and credits the investor's wallet.
    async fn settle_payout(
        &self,
        execution_id: ExecutionId,
        payout: &PlannedPayout,
        receipt: &ChargeReceipt,
    ) -> std::result::Result<(), String> {
        let policy = self.config.activity_retry;

        let record_step = PayoutStep::RecordTransaction.scoped_name(payout.investment_id);
        let recorded: std::result::Result<PayoutRecorded, ActivityError> = self
            .executor
            .invoke(execution_id, &record_step, policy, |_key| {
                let reference = receipt.payment_reference.clone();
                let amount = payout.amount;
                async move {
                    Ok(PayoutRecorded {
                        payment_reference: reference,
                        amount,
                    })
                }
            })
            .await
            .map_err(|e| e.to_string())?;
        recorded.map_err(|e| e.reason().to_string())?;

        let credit_step = PayoutStep::CreditWalletBalance.scoped_name(payout.investment_id);
        let credited: std::result::Result<LedgerEntryRecorded, ActivityError> = self
            .executor
            .invoke(execution_id, &credit_step, policy, |_key| {
                let store = self.store.clone();
                let user_id = payout.user_id;
                let amount = payout.amount;
                let reference = receipt.payment_reference.clone();
                async move {
                    let entry = store
                        .append_ledger_entry(user_id, amount, &reference)
                        .await
                        .map_err(store_failure)?;
                    Ok(LedgerEntryRecorded {
                        entry_id: entry.id,
                        balance_after: entry.balance_after,
                    })
                }
            })
            .await
            .map_err(|e| e.to_string())?;
        credited.map_err(|e| e.reason().to_string())?;

        Ok(())
    }

    /// Flags a payout whose money moved but whose bookkeeping failed.
    async fn flag_payout(
        &self,
        execution_id: ExecutionId,
        payout: &PlannedPayout,
        receipt: &ChargeReceipt,
        reason: &str,
    ) {
        tracing::error!(
            %execution_id,
            investment_id = %payout.investment_id,
            payment_reference = %receipt.payment_reference,
            %reason,
            "payout settled at gateway but bookkeeping failed, flagging for manual intervention"
        );
        let intervention = ManualIntervention::new(
            execution_id,
            PayoutStep::CreditWalletBalance.scoped_name(payout.investment_id),
            format!(
                "payout {} settled but was not credited: {reason}",
                receipt.payment_reference
            ),
        );
        if let Err(err) = self.store.flag_intervention(&intervention).await {
            tracing::error!(%execution_id, error = %err, "failed to persist manual intervention");
        }
        metrics::counter!("manual_interventions_total").increment(1);
    }
}
