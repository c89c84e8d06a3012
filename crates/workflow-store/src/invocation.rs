//! Activity invocation log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::ExecutionId;

/// Outcome of a single activity attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// The attempt completed and its result was captured.
    Succeeded,
    /// The attempt failed (transiently or permanently).
    Failed,
    /// The attempt exceeded its per-attempt timeout.
    TimedOut,
}

impl InvocationStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Succeeded => "succeeded",
            InvocationStatus::Failed => "failed",
            InvocationStatus::TimedOut => "timed_out",
        }
    }

    /// Parses a status name produced by [`InvocationStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(InvocationStatus::Succeeded),
            "failed" => Some(InvocationStatus::Failed),
            "timed_out" => Some(InvocationStatus::TimedOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derives the idempotency key for an activity call.
///
/// The key is a pure function of the execution and step so that retries
/// and re-deliveries after a crash present the same key to external
/// collaborators, which treat repeated keys as already-applied.
pub fn idempotency_key(workflow_id: ExecutionId, step_name: &str) -> String {
    format!("wf:{workflow_id}:{step_name}")
}

/// One attempt to run a named activity within a workflow step.
///
/// Invocation rows are the replay log: after a crash the engine consults
/// them to skip side effects that already succeeded. At most one row per
/// `(workflow_id, step_name)` may be `Succeeded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInvocation {
    pub workflow_id: ExecutionId,
    pub step_name: String,
    pub attempt_number: u32,
    pub status: InvocationStatus,
    pub idempotency_key: String,
    pub result: Option<serde_json::Value>,
    pub error_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ActivityInvocation {
    /// Records a succeeded attempt with its serialized result.
    pub fn succeeded(
        workflow_id: ExecutionId,
        step_name: impl Into<String>,
        attempt_number: u32,
        result: serde_json::Value,
    ) -> Self {
        let step_name = step_name.into();
        Self {
            idempotency_key: idempotency_key(workflow_id, &step_name),
            workflow_id,
            step_name,
            attempt_number,
            status: InvocationStatus::Succeeded,
            result: Some(result),
            error_reason: None,
            recorded_at: Utc::now(),
        }
    }

    /// Records a failed attempt with the failure reason.
    pub fn failed(
        workflow_id: ExecutionId,
        step_name: impl Into<String>,
        attempt_number: u32,
        error_reason: impl Into<String>,
    ) -> Self {
        let step_name = step_name.into();
        Self {
            idempotency_key: idempotency_key(workflow_id, &step_name),
            workflow_id,
            step_name,
            attempt_number,
            status: InvocationStatus::Failed,
            result: None,
            error_reason: Some(error_reason.into()),
            recorded_at: Utc::now(),
        }
    }

    /// Records a timed-out attempt.
    pub fn timed_out(
        workflow_id: ExecutionId,
        step_name: impl Into<String>,
        attempt_number: u32,
    ) -> Self {
        let step_name = step_name.into();
        Self {
            idempotency_key: idempotency_key(workflow_id, &step_name),
            workflow_id,
            step_name,
            attempt_number,
            status: InvocationStatus::TimedOut,
            result: None,
            error_reason: Some("attempt timed out".to_string()),
            recorded_at: Utc::now(),
        }
    }
}
