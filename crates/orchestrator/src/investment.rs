//! Investment-creation saga coordinator.
//!
//! Drives the seven-step saga against the engine's collaborators. Each
//! completed step durably advances the execution's cursor before the next
//! step starts, and every activity result lands in the invocation log, so
//! a re-delivered execution resumes exactly where it stopped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use common::{ExecutionId, InvestmentId, PropertyId, UserId};
use domain::{Investment, InvestmentStatus, Money, PaymentMethod};
use workflow_store::{ManualIntervention, StoreError, WorkflowExecution, WorkflowStatus, WorkflowStore};

use crate::activity::ActivityError;
use crate::collaborators::{
    ChargeReceipt, ComplianceChecker, ComplianceDecision, NotificationService, PaymentProcessor,
    RefundReceipt, ShareAllocator,
};
use crate::engine::WorkflowEngine;
use crate::error::{OrchestratorError, Result};
use crate::step::InvestmentStep;

/// Request payload of an investment-creation execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRequest {
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
}

/// Logged result of the create-investment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct InvestmentCreated {
    pub investment_id: InvestmentId,
}

/// Logged result of the two ledger steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LedgerEntryRecorded {
    pub entry_id: uuid::Uuid,
    pub balance_after: Money,
}

/// Logged result of a notification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NotificationOutcome {
    pub delivered: bool,
}

/// What a step run meant for the saga.
enum StepOutcome {
    /// Advance the cursor and continue.
    Completed,
    /// Compliance said no: terminal, no compensation, not an error.
    Rejected(String),
    /// Permanent activity failure: fail, compensating if needed.
    Failed(String),
}

pub(crate) fn store_failure(err: StoreError) -> ActivityError {
    ActivityError::Transient(err.to_string())
}

impl<S, C, P, N, A> WorkflowEngine<S, C, P, N, A>
where
    S: WorkflowStore + Clone,
    C: ComplianceChecker,
    P: PaymentProcessor,
    N: NotificationService,
    A: ShareAllocator,
{
    /// Runs (or resumes) an investment-creation execution.
    pub(crate) async fn run_investment(
        &self,
        mut execution: WorkflowExecution,
    ) -> Result<WorkflowExecution> {
        let request: InvestmentRequest = serde_json::from_value(execution.input.clone())?;

        if execution.status == WorkflowStatus::Pending {
            execution.start()?;
            self.store.update_execution(&execution).await?;
        }

        let total_steps = InvestmentStep::SEQUENCE.len() as u32;
        while execution.current_step_index < total_steps {
            let step = InvestmentStep::SEQUENCE[execution.current_step_index as usize];
            tracing::info!(execution_id = %execution.id, step = %step, "saga step started");

            match self.run_investment_step(&execution, step, &request).await? {
                StepOutcome::Completed => {
                    execution.advance_cursor(execution.current_step_index + 1)?;
                    self.store.update_execution(&execution).await?;
                }
                StepOutcome::Rejected(reason) => {
                    tracing::info!(execution_id = %execution.id, %reason, "investment rejected");
                    execution.fail(format!("compliance rejected: {reason}"))?;
                    self.store.update_execution(&execution).await?;
                    metrics::counter!("workflow_failed").increment(1);
                    return Ok(execution);
                }
                StepOutcome::Failed(reason) => {
                    return self.fail_investment(execution, &request, step, reason).await;
                }
            }
        }

        execution.complete()?;
        self.store.update_execution(&execution).await?;
        metrics::counter!("workflow_completed").increment(1);
        tracing::info!(execution_id = %execution.id, "investment saga completed");
        Ok(execution)
    }

    /// Runs one step and reports what it meant for the saga.
    async fn run_investment_step(
        &self,
        execution: &WorkflowExecution,
        step: InvestmentStep,
        request: &InvestmentRequest,
    ) -> Result<StepOutcome> {
        let policy = self.config.activity_retry;

        match step {
            InvestmentStep::VerifyCompliance => {
                let outcome: std::result::Result<ComplianceDecision, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        self.compliance
                            .check(request.user_id, request.property_id, request.amount)
                    })
                    .await?;

                Ok(match outcome {
                    Ok(decision) if decision.approved => StepOutcome::Completed,
                    Ok(decision) => StepOutcome::Rejected(
                        decision.reason.unwrap_or_else(|| "not approved".to_string()),
                    ),
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::ProcessPayment => {
                let outcome: std::result::Result<ChargeReceipt, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |key| async move {
                        self.payment
                            .charge(&key, request.user_id, request.amount, request.payment_method)
                            .await
                    })
                    .await?;

                Ok(match outcome {
                    Ok(_) => StepOutcome::Completed,
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::CreateInvestment => {
                let receipt: ChargeReceipt = self
                    .require_logged(execution.id, InvestmentStep::ProcessPayment.name())
                    .await?;

                let outcome: std::result::Result<InvestmentCreated, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        let store = self.store.clone();
                        let request = request.clone();
                        let reference = receipt.payment_reference.clone();
                        async move {
                            let investment = Investment::new(
                                request.user_id,
                                request.property_id,
                                request.amount,
                                reference,
                            );
                            store
                                .insert_investment(&investment)
                                .await
                                .map_err(store_failure)?;
                            Ok(InvestmentCreated {
                                investment_id: investment.id,
                            })
                        }
                    })
                    .await?;

                Ok(match outcome {
                    Ok(_) => StepOutcome::Completed,
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::RecordLedgerTransaction => {
                let receipt: ChargeReceipt = self
                    .require_logged(execution.id, InvestmentStep::ProcessPayment.name())
                    .await?;

                let outcome: std::result::Result<LedgerEntryRecorded, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        let store = self.store.clone();
                        let reference = receipt.payment_reference.clone();
                        let user_id = request.user_id;
                        let amount = request.amount;
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
                    .await?;

                Ok(match outcome {
                    Ok(_) => StepOutcome::Completed,
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::DebitWalletBalance => {
                let created: InvestmentCreated = self
                    .require_logged(execution.id, InvestmentStep::CreateInvestment.name())
                    .await?;

                let outcome: std::result::Result<LedgerEntryRecorded, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        let store = self.store.clone();
                        let user_id = request.user_id;
                        let amount = request.amount;
                        let reference = created.investment_id.to_string();
                        async move {
                            let entry = store
                                .append_ledger_entry(user_id, amount.negated(), &reference)
                                .await
                                .map_err(store_failure)?;
                            Ok(LedgerEntryRecorded {
                                entry_id: entry.id,
                                balance_after: entry.balance_after,
                            })
                        }
                    })
                    .await?;

                Ok(match outcome {
                    Ok(_) => StepOutcome::Completed,
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::DistributeShares => {
                let created: InvestmentCreated = self
                    .require_logged(execution.id, InvestmentStep::CreateInvestment.name())
                    .await?;

                let outcome = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        self.shares.allocate(
                            request.user_id,
                            request.property_id,
                            request.amount,
                            created.investment_id,
                        )
                    })
                    .await?;

                Ok(match outcome {
                    Ok(_) => StepOutcome::Completed,
                    Err(err) => StepOutcome::Failed(err.reason().to_string()),
                })
            }

            InvestmentStep::NotifyInvestor => {
                let outcome: std::result::Result<NotificationOutcome, _> = self
                    .executor
                    .invoke(execution.id, step.name(), policy, |_key| {
                        let payload = serde_json::json!({
                            "execution_id": execution.id,
                            "property_id": request.property_id,
                            "amount_kobo": request.amount.kobo(),
                        });
                        async move {
                            self.notifications
                                .send(request.user_id, "investment_completed", payload)
                                .await?;
                            Ok(NotificationOutcome { delivered: true })
                        }
                    })
                    .await?;

                // Notification is best-effort: log and keep going.
                if let Err(err) = outcome {
                    tracing::warn!(
                        execution_id = %execution.id,
                        reason = err.reason(),
                        "investor notification failed"
                    );
                    metrics::counter!("notifications_failed_total").increment(1);
                }
                Ok(StepOutcome::Completed)
            }
        }
    }

    /// Terminates a failed saga, compensating the charge if one settled.
    async fn fail_investment(
        &self,
        mut execution: WorkflowExecution,
        request: &InvestmentRequest,
        failed_step: InvestmentStep,
        reason: String,
    ) -> Result<WorkflowExecution> {
        let reason = format!("step '{failed_step}' failed: {reason}");
        let charged: Option<ChargeReceipt> = self
            .logged_result(execution.id, InvestmentStep::ProcessPayment.name())
            .await?;

        let Some(receipt) = charged else {
            // Nothing irreversible happened; fail outright.
            execution.fail(&reason)?;
            self.store.update_execution(&execution).await?;
            metrics::counter!("workflow_failed").increment(1);
            tracing::warn!(execution_id = %execution.id, %reason, "investment failed before charge");
            return Ok(execution);
        };

        execution.begin_compensation(&reason)?;
        self.store.update_execution(&execution).await?;
        metrics::counter!("workflow_compensations_total").increment(1);
        tracing::warn!(
            execution_id = %execution.id,
            payment_reference = %receipt.payment_reference,
            %reason,
            "compensating settled charge"
        );

        let refund: std::result::Result<RefundReceipt, _> = self
            .executor
            .invoke(
                execution.id,
                "refund_payment",
                self.config.compensation_retry,
                |_key| self.payment.refund(&receipt.payment_reference),
            )
            .await?;

        match refund {
            Ok(_) => {
                // The record was created against a charge that no longer
                // stands; keep it for audit but take it out of circulation.
                let created: Option<InvestmentCreated> = self
                    .logged_result(execution.id, InvestmentStep::CreateInvestment.name())
                    .await?;
                if let Some(created) = created {
                    self.store
                        .update_investment_status(created.investment_id, InvestmentStatus::Failed)
                        .await?;
                }
            }
            Err(err) => {
                // Bounded compensation exhausted: hand the charge to an
                // operator instead of looping.
                tracing::error!(
                    execution_id = %execution.id,
                    payment_reference = %receipt.payment_reference,
                    reason = err.reason(),
                    "refund exhausted retries, flagging for manual intervention"
                );
                self.store
                    .flag_intervention(&ManualIntervention::new(
                        execution.id,
                        "refund_payment",
                        format!(
                            "refund of {} failed: {}",
                            receipt.payment_reference,
                            err.reason()
                        ),
                    ))
                    .await?;
                metrics::counter!("manual_interventions_total").increment(1);
            }
        }

        // Best-effort failure notification; never blocks the terminal state.
        let payload = serde_json::json!({
            "execution_id": execution.id,
            "property_id": request.property_id,
            "amount_kobo": request.amount.kobo(),
            "reason": reason,
        });
        if let Err(err) = self
            .notifications
            .send(request.user_id, "investment_failed", payload)
            .await
        {
            tracing::warn!(
                execution_id = %execution.id,
                reason = err.reason(),
                "failure notification not delivered"
            );
        }

        execution.fail(&reason)?;
        self.store.update_execution(&execution).await?;
        metrics::counter!("workflow_failed").increment(1);
        Ok(execution)
    }

    /// Reads a step's logged result, if it succeeded.
    pub(crate) async fn logged_result<T: DeserializeOwned>(
        &self,
        execution_id: ExecutionId,
        step_name: &str,
    ) -> Result<Option<T>> {
        match self.store.succeeded_invocation(execution_id, step_name).await? {
            Some(invocation) => {
                let value = invocation.result.unwrap_or(serde_json::Value::Null);
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    /// Reads a step's logged result that earlier steps guarantee exists.
    pub(crate) async fn require_logged<T: DeserializeOwned>(
        &self,
        execution_id: ExecutionId,
        step_name: &str,
    ) -> Result<T> {
        self.logged_result(execution_id, step_name)
            .await?
            .ok_or_else(|| OrchestratorError::MissingStepResult {
                execution_id,
                step: step_name.to_string(),
            })
    }
}
