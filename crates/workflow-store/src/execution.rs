//! Workflow execution records and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::ExecutionId;

use crate::error::StoreError;

/// The two workflow shapes the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Linear compensating saga creating one investment.
    InvestmentCreation,
    /// Fan-out batch distributing returns across investors.
    RoiDistribution,
}

impl WorkflowType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::InvestmentCreation => "investment_creation",
            WorkflowType::RoiDistribution => "roi_distribution",
        }
    }

    /// Parses a type name produced by [`WorkflowType::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "investment_creation" => Some(WorkflowType::InvestmentCreation),
            "roi_distribution" => Some(WorkflowType::RoiDistribution),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a workflow execution in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Running ──┬──► Completed
///                       └──► Compensating ──► Failed
/// ```
/// Running may also move straight to Failed when nothing irreversible
/// has happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created and enqueued, not yet picked up by a worker.
    #[default]
    Pending,

    /// Steps are being executed.
    Running,

    /// A step failed after an irreversible side effect; compensating
    /// activities are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// The execution failed, after compensation if any was needed
    /// (terminal state).
    Failed,
}

impl WorkflowStatus {
    /// Returns true if a worker may start (or resume) running steps.
    pub fn can_run(&self) -> bool {
        matches!(self, WorkflowStatus::Pending | WorkflowStatus::Running)
    }

    /// Returns true if compensation may begin.
    pub fn can_compensate(&self) -> bool {
        matches!(self, WorkflowStatus::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Compensating => "compensating",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Parses a status name produced by [`WorkflowStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WorkflowStatus::Pending),
            "running" => Some(WorkflowStatus::Running),
            "compensating" => Some(WorkflowStatus::Compensating),
            "completed" => Some(WorkflowStatus::Completed),
            "failed" => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One instance of a running or completed workflow.
///
/// The record is mutated exclusively through the methods below, which
/// enforce the two persistence invariants: the step cursor only advances,
/// and a terminal status never changes again. Executions are archived on
/// terminal status, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_type: WorkflowType,
    /// Opaque request payload, deserialized by the owning coordinator.
    pub input: serde_json::Value,
    pub status: WorkflowStatus,
    pub current_step_index: u32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Creates a new pending execution for the given request payload.
    pub fn new(workflow_type: WorkflowType, input: serde_json::Value) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_type,
            input,
            status: WorkflowStatus::Pending,
            current_step_index: 0,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Marks the execution as picked up by a worker.
    pub fn start(&mut self) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        self.status = WorkflowStatus::Running;
        Ok(())
    }

    /// Advances the step cursor to `index`.
    ///
    /// The cursor is monotonic: moving it backwards is a bug in the
    /// caller and is rejected.
    pub fn advance_cursor(&mut self, index: u32) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        if index < self.current_step_index {
            return Err(StoreError::CursorRegression {
                execution_id: self.id,
                current: self.current_step_index,
                attempted: index,
            });
        }
        self.current_step_index = index;
        Ok(())
    }

    /// Marks the execution as compensating after a post-irreversible failure.
    pub fn begin_compensation(&mut self, reason: impl Into<String>) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        self.status = WorkflowStatus::Compensating;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Marks the execution completed (terminal).
    pub fn complete(&mut self) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the execution failed (terminal) with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        self.status = WorkflowStatus::Failed;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason.into());
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(StoreError::TerminalExecution {
                execution_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_execution() -> WorkflowExecution {
        WorkflowExecution::new(
            WorkflowType::InvestmentCreation,
            serde_json::json!({"amount_kobo": 5_000_000}),
        )
    }

    #[test]
    fn test_new_execution_is_pending_at_step_zero() {
        let exec = make_execution();
        assert_eq!(exec.status, WorkflowStatus::Pending);
        assert_eq!(exec.current_step_index, 0);
        assert!(exec.completed_at.is_none());
    }

    #[test]
    fn test_cursor_advances_monotonically() {
        let mut exec = make_execution();
        exec.start().unwrap();
        exec.advance_cursor(1).unwrap();
        exec.advance_cursor(3).unwrap();

        let result = exec.advance_cursor(2);
        assert!(matches!(result, Err(StoreError::CursorRegression { .. })));
        assert_eq!(exec.current_step_index, 3);
    }

    #[test]
    fn test_terminal_status_is_immutable() {
        let mut exec = make_execution();
        exec.start().unwrap();
        exec.complete().unwrap();

        assert!(matches!(
            exec.fail("too late"),
            Err(StoreError::TerminalExecution { .. })
        ));
        assert!(matches!(
            exec.advance_cursor(5),
            Err(StoreError::TerminalExecution { .. })
        ));
        assert_eq!(exec.status, WorkflowStatus::Completed);
    }

    #[test]
    fn test_compensation_path_keeps_original_reason() {
        let mut exec = make_execution();
        exec.start().unwrap();
        exec.begin_compensation("ledger write failed").unwrap();
        assert_eq!(exec.status, WorkflowStatus::Compensating);

        exec.fail("compensated").unwrap();
        assert_eq!(exec.status, WorkflowStatus::Failed);
        assert_eq!(exec.failure_reason.as_deref(), Some("ledger write failed"));
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn test_status_predicates() {
        assert!(WorkflowStatus::Pending.can_run());
        assert!(WorkflowStatus::Running.can_run());
        assert!(!WorkflowStatus::Compensating.can_run());
        assert!(WorkflowStatus::Running.can_compensate());
        assert!(!WorkflowStatus::Pending.can_compensate());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }

    #[test]
    fn test_round_trip_of_names() {
        for status in [
            WorkflowStatus::Pending,
            WorkflowStatus::Running,
            WorkflowStatus::Compensating,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
        ] {
            assert_eq!(WorkflowStatus::parse(status.as_str()), Some(status));
        }
        for wf_type in [WorkflowType::InvestmentCreation, WorkflowType::RoiDistribution] {
            assert_eq!(WorkflowType::parse(wf_type.as_str()), Some(wf_type));
        }
        assert_eq!(WorkflowStatus::parse("bogus"), None);
    }
}
