//! Manual intervention queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::ExecutionId;

/// An execution whose compensation (or post-charge bookkeeping) exhausted
/// its retries and needs an operator.
///
/// Flagged items are never resolved automatically; they exist so that no
/// money movement is silently lost when automated recovery gives up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualIntervention {
    pub execution_id: ExecutionId,
    pub step_name: String,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

impl ManualIntervention {
    /// Flags a step of an execution for operator follow-up.
    pub fn new(
        execution_id: ExecutionId,
        step_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            step_name: step_name.into(),
            reason: reason.into(),
            flagged_at: Utc::now(),
        }
    }
}
