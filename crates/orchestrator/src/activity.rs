//! Activity execution with timeouts, retries and idempotent replay.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use common::ExecutionId;
use workflow_store::{ActivityInvocation, WorkflowStore, idempotency_key};

use crate::error::Result;

/// How an activity call failed.
///
/// The distinction drives retry behavior: transient failures and timeouts
/// are retried with the same idempotency key, permanent failures are not.
#[derive(Debug, Clone, Error)]
pub enum ActivityError {
    /// A failure worth retrying (network error, 5xx-equivalent).
    #[error("transient failure: {0}")]
    Transient(String),

    /// A failure no retry will fix (declined, invalid input, exhausted retries).
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ActivityError {
    /// Returns the failure message without the classification prefix.
    pub fn reason(&self) -> &str {
        match self {
            ActivityError::Transient(reason) | ActivityError::Permanent(reason) => reason,
        }
    }
}

/// Retry policy for a single activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts before the failure becomes permanent.
    pub max_attempts: u32,
    /// Per-attempt timeout.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and timeout.
    pub fn new(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
        }
    }
}

/// Runs named activities for workflow steps.
///
/// Every attempt is persisted as an [`ActivityInvocation`] row, and the
/// log is consulted before invoking: if a succeeded row already exists for
/// `(workflow_id, step_name)` its captured result is replayed without
/// touching the collaborator again. Combined with the deterministic
/// idempotency key handed to the operation, this is what makes
/// re-delivered executions safe — a crashed-and-restarted workflow never
/// charges twice.
#[derive(Clone)]
pub struct ActivityExecutor<S> {
    store: S,
}

impl<S: WorkflowStore + Clone> ActivityExecutor<S> {
    /// Creates an executor persisting to the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Invokes an activity, replaying a prior success if one is logged.
    ///
    /// `op` receives the idempotency key for the step and performs the
    /// actual call. Its result is serialized into the invocation log on
    /// success so a later replay can return it without re-invoking.
    ///
    /// Returns `ActivityError::Permanent` once the attempt budget is
    /// exhausted or the operation reports a permanent failure.
    pub async fn invoke<T, F, Fut>(
        &self,
        workflow_id: ExecutionId,
        step_name: &str,
        policy: RetryPolicy,
        op: F,
    ) -> Result<std::result::Result<T, ActivityError>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, ActivityError>>,
    {
        if let Some(prior) = self.store.succeeded_invocation(workflow_id, step_name).await? {
            tracing::debug!(%workflow_id, step = step_name, "replaying logged activity result");
            let value = prior.result.unwrap_or(serde_json::Value::Null);
            return Ok(Ok(serde_json::from_value(value)?));
        }

        let key = idempotency_key(workflow_id, step_name);
        let mut last_reason = String::new();

        for attempt in 1..=policy.max_attempts {
            metrics::counter!("activity_attempts_total").increment(1);
            if attempt > 1 {
                metrics::counter!("activity_retries_total").increment(1);
            }

            match tokio::time::timeout(policy.attempt_timeout, op(key.clone())).await {
                Ok(Ok(value)) => {
                    let result = serde_json::to_value(&value)?;
                    self.store
                        .record_invocation(&ActivityInvocation::succeeded(
                            workflow_id,
                            step_name,
                            attempt,
                            result,
                        ))
                        .await?;
                    return Ok(Ok(value));
                }
                Ok(Err(ActivityError::Transient(reason))) => {
                    tracing::warn!(
                        %workflow_id,
                        step = step_name,
                        attempt,
                        %reason,
                        "activity attempt failed transiently"
                    );
                    self.store
                        .record_invocation(&ActivityInvocation::failed(
                            workflow_id,
                            step_name,
                            attempt,
                            &reason,
                        ))
                        .await?;
                    last_reason = reason;
                }
                Ok(Err(ActivityError::Permanent(reason))) => {
                    tracing::warn!(
                        %workflow_id,
                        step = step_name,
                        attempt,
                        %reason,
                        "activity failed permanently"
                    );
                    self.store
                        .record_invocation(&ActivityInvocation::failed(
                            workflow_id,
                            step_name,
                            attempt,
                            &reason,
                        ))
                        .await?;
                    return Ok(Err(ActivityError::Permanent(reason)));
                }
                Err(_) => {
                    tracing::warn!(
                        %workflow_id,
                        step = step_name,
                        attempt,
                        timeout_secs = policy.attempt_timeout.as_secs(),
                        "activity attempt timed out"
                    );
                    self.store
                        .record_invocation(&ActivityInvocation::timed_out(
                            workflow_id,
                            step_name,
                            attempt,
                        ))
                        .await?;
                    last_reason = "attempt timed out".to_string();
                }
            }
        }

        Ok(Err(ActivityError::Permanent(format!(
            "{last_reason} (after {} attempts)",
            policy.max_attempts
        ))))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde::{Deserialize, Serialize};
    use workflow_store::{InMemoryWorkflowStore, InvocationStatus};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Receipt {
        reference: String,
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn success_records_one_succeeded_row() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();

        let result = executor
            .invoke(workflow_id, "process_payment", policy(3), |key| async move {
                Ok(Receipt {
                    reference: format!("PAY:{key}"),
                })
            })
            .await
            .unwrap()
            .unwrap();

        assert!(result.reference.starts_with("PAY:wf:"));
        let rows = store.invocations(workflow_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, InvocationStatus::Succeeded);
    }

    #[tokio::test]
    async fn transient_failures_retry_with_the_same_key() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();
        let calls = Arc::new(AtomicU32::new(0));
        let seen_keys = Arc::new(std::sync::Mutex::new(Vec::new()));

        let calls_ref = calls.clone();
        let keys_ref = seen_keys.clone();
        let result = executor
            .invoke(workflow_id, "process_payment", policy(3), move |key| {
                let calls = calls_ref.clone();
                let keys = keys_ref.clone();
                async move {
                    keys.lock().unwrap().push(key);
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ActivityError::Transient("connection reset".to_string()))
                    } else {
                        Ok(Receipt {
                            reference: "PAY-1".to_string(),
                        })
                    }
                }
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.reference, "PAY-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let keys = seen_keys.lock().unwrap();
        assert!(keys.iter().all(|k| k == &keys[0]));

        let rows = store.invocations(workflow_id).await.unwrap();
        assert_eq!(rows.len(), 3);
        let succeeded = rows
            .iter()
            .filter(|r| r.status == InvocationStatus::Succeeded)
            .count();
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn permanent_failure_stops_retrying() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let result: std::result::Result<Receipt, _> = executor
            .invoke(workflow_id, "process_payment", policy(3), move |_key| {
                let calls = calls_ref.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ActivityError::Permanent("card declined".to_string()))
                }
            })
            .await
            .unwrap();

        assert!(matches!(result, Err(ActivityError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.invocations(workflow_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_become_permanent() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();

        let result: std::result::Result<Receipt, _> = executor
            .invoke(workflow_id, "process_payment", policy(2), |_key| async {
                Err(ActivityError::Transient("gateway 503".to_string()))
            })
            .await
            .unwrap();

        match result {
            Err(ActivityError::Permanent(reason)) => {
                assert!(reason.contains("gateway 503"));
                assert!(reason.contains("2 attempts"));
            }
            other => panic!("expected permanent failure, got {other:?}"),
        }
        assert_eq!(store.invocations(workflow_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timeout_counts_as_an_attempt() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();
        let calls = Arc::new(AtomicU32::new(0));

        let short = RetryPolicy::new(2, Duration::from_millis(20));
        let calls_ref = calls.clone();
        let result: std::result::Result<Receipt, _> = executor
            .invoke(workflow_id, "process_payment", short, move |_key| {
                let calls = calls_ref.clone();
                async move {
                    // First attempt hangs past the timeout, second succeeds.
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok(Receipt {
                        reference: "PAY-2".to_string(),
                    })
                }
            })
            .await
            .unwrap();

        assert_eq!(result.unwrap().reference, "PAY-2");
        let rows = store.invocations(workflow_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, InvocationStatus::TimedOut);
        assert_eq!(rows[1].status, InvocationStatus::Succeeded);
    }

    #[tokio::test]
    async fn replay_returns_logged_result_without_invoking() {
        let store = InMemoryWorkflowStore::new();
        let executor = ActivityExecutor::new(store.clone());
        let workflow_id = ExecutionId::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let run = |executor: ActivityExecutor<InMemoryWorkflowStore>| {
            let calls = calls_ref.clone();
            async move {
                executor
                    .invoke(workflow_id, "process_payment", policy(3), move |_key| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Receipt {
                                reference: "PAY-3".to_string(),
                            })
                        }
                    })
                    .await
                    .unwrap()
                    .unwrap()
            }
        };

        let first = run(executor.clone()).await;
        let second = run(executor).await;

        assert_eq!(first, second);
        // The second invoke replayed the log instead of calling again.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.invocations(workflow_id).await.unwrap().len(), 1);
    }
}
