//! Share allocator trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::{InvestmentId, PropertyId, UserId};
use domain::Money;

use crate::activity::ActivityError;

/// Result of a successful share allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareAllocation {
    /// The allocation reference assigned by the allocator.
    pub allocation_id: String,
}

/// Trait for the off-subsystem mechanism that grants ownership shares
/// (e.g. token issuance).
#[async_trait]
pub trait ShareAllocator: Send + Sync {
    /// Allocates ownership shares for an investment.
    async fn allocate(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        amount: Money,
        investment_id: InvestmentId,
    ) -> Result<ShareAllocation, ActivityError>;
}

#[derive(Debug, Default)]
struct InMemoryShareState {
    allocations: HashMap<String, (InvestmentId, UserId, Money)>,
    next_id: u32,
    fail_on_allocate: bool,
}

/// In-memory share allocator for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShareAllocator {
    state: Arc<RwLock<InMemoryShareState>>,
}

impl InMemoryShareAllocator {
    /// Creates a new in-memory share allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the allocator to fail subsequent allocations permanently.
    pub fn set_fail_on_allocate(&self, fail: bool) {
        self.state.write().unwrap().fail_on_allocate = fail;
    }

    /// Returns the number of allocations made.
    pub fn allocation_count(&self) -> usize {
        self.state.read().unwrap().allocations.len()
    }
}

#[async_trait]
impl ShareAllocator for InMemoryShareAllocator {
    async fn allocate(
        &self,
        user_id: UserId,
        _property_id: PropertyId,
        amount: Money,
        investment_id: InvestmentId,
    ) -> Result<ShareAllocation, ActivityError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_allocate {
            return Err(ActivityError::Permanent(
                "share registry rejected allocation".to_string(),
            ));
        }

        state.next_id += 1;
        let allocation_id = format!("ALLOC-{:04}", state.next_id);
        state
            .allocations
            .insert(allocation_id.clone(), (investment_id, user_id, amount));

        Ok(ShareAllocation { allocation_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allocate() {
        let allocator = InMemoryShareAllocator::new();

        let allocation = allocator
            .allocate(
                UserId::new(),
                PropertyId::new(),
                Money::from_naira(1000),
                InvestmentId::new(),
            )
            .await
            .unwrap();
        assert!(allocation.allocation_id.starts_with("ALLOC-"));
        assert_eq!(allocator.allocation_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_allocate() {
        let allocator = InMemoryShareAllocator::new();
        allocator.set_fail_on_allocate(true);

        let result = allocator
            .allocate(
                UserId::new(),
                PropertyId::new(),
                Money::from_naira(1000),
                InvestmentId::new(),
            )
            .await;
        assert!(matches!(result, Err(ActivityError::Permanent(_))));
        assert_eq!(allocator.allocation_count(), 0);
    }
}
