//! Compliance checker trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::{PropertyId, UserId};
use domain::Money;

use crate::activity::ActivityError;

/// Outcome of a compliance check.
///
/// A rejection is a decision, not a failure: it comes back as `Ok` with
/// `approved = false` and the saga ends terminally without compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDecision {
    pub approved: bool,
    pub reason: Option<String>,
}

impl ComplianceDecision {
    /// An approval.
    pub fn approved() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    /// A rejection with the compliance reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// Trait for compliance screening of investment requests.
#[async_trait]
pub trait ComplianceChecker: Send + Sync {
    /// Screens an investment for the given user, property and amount.
    async fn check(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        amount: Money,
    ) -> Result<ComplianceDecision, ActivityError>;
}

#[derive(Debug, Default)]
struct InMemoryComplianceState {
    checks: u32,
    reject_reason: Option<String>,
    fail_with: Option<String>,
}

/// In-memory compliance checker for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryComplianceChecker {
    state: Arc<RwLock<InMemoryComplianceState>>,
}

impl InMemoryComplianceChecker {
    /// Creates a checker that approves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the checker to reject subsequent requests.
    pub fn set_reject(&self, reason: impl Into<String>) {
        self.state.write().unwrap().reject_reason = Some(reason.into());
    }

    /// Configures the checker to fail transiently on subsequent requests.
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        self.state.write().unwrap().fail_with = Some(reason.into());
    }

    /// Returns the number of checks performed.
    pub fn check_count(&self) -> u32 {
        self.state.read().unwrap().checks
    }
}

#[async_trait]
impl ComplianceChecker for InMemoryComplianceChecker {
    async fn check(
        &self,
        _user_id: UserId,
        _property_id: PropertyId,
        _amount: Money,
    ) -> Result<ComplianceDecision, ActivityError> {
        let mut state = self.state.write().unwrap();

        if let Some(reason) = &state.fail_with {
            return Err(ActivityError::Transient(reason.clone()));
        }

        state.checks += 1;
        match &state.reject_reason {
            Some(reason) => Ok(ComplianceDecision::rejected(reason.clone())),
            None => Ok(ComplianceDecision::approved()),
        }
    }
}
