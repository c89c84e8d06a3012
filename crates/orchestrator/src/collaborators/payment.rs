//! Payment processor trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::UserId;
use domain::{Money, PaymentMethod};

use crate::activity::ActivityError;

/// Receipt for a settled charge or disbursement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// The payment reference assigned by the gateway.
    pub payment_reference: String,
}

/// Receipt for a settled refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    /// The refunded payment reference.
    pub payment_reference: String,
}

/// Trait for payment gateway operations.
///
/// Implementations must be idempotent per `idempotency_key`: re-delivery
/// of a charge with a key that already settled returns the original
/// receipt without moving money again. This is the contract the retry
/// machinery leans on.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charges (or disburses to) a user.
    async fn charge(
        &self,
        idempotency_key: &str,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<ChargeReceipt, ActivityError>;

    /// Refunds a previously settled payment. Idempotent per reference.
    async fn refund(&self, payment_reference: &str) -> Result<RefundReceipt, ActivityError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    /// Settled charges keyed by idempotency key.
    charges: HashMap<String, ChargeReceipt>,
    refunded: HashSet<String>,
    next_id: u32,
    decline_charges: bool,
    decline_users: HashSet<UserId>,
    transient_charge_failures: u32,
    fail_refunds: bool,
}

/// In-memory payment processor for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to decline subsequent charges permanently.
    pub fn set_decline_charges(&self, decline: bool) {
        self.state.write().unwrap().decline_charges = decline;
    }

    /// Configures the processor to decline charges for one user only.
    pub fn set_decline_user(&self, user_id: UserId) {
        self.state.write().unwrap().decline_users.insert(user_id);
    }

    /// Makes the next `count` charge attempts fail transiently.
    pub fn set_transient_charge_failures(&self, count: u32) {
        self.state.write().unwrap().transient_charge_failures = count;
    }

    /// Configures the processor to fail subsequent refunds permanently.
    pub fn set_fail_refunds(&self, fail: bool) {
        self.state.write().unwrap().fail_refunds = fail;
    }

    /// Returns the number of distinct settled charges.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the number of refunds issued.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunded.len()
    }

    /// Returns true if the payment reference has been refunded.
    pub fn is_refunded(&self, payment_reference: &str) -> bool {
        self.state.read().unwrap().refunded.contains(payment_reference)
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn charge(
        &self,
        idempotency_key: &str,
        user_id: UserId,
        _amount: Money,
        _method: PaymentMethod,
    ) -> Result<ChargeReceipt, ActivityError> {
        let mut state = self.state.write().unwrap();

        // Idempotent replay: a settled key returns the original receipt.
        if let Some(receipt) = state.charges.get(idempotency_key) {
            return Ok(receipt.clone());
        }

        if state.transient_charge_failures > 0 {
            state.transient_charge_failures -= 1;
            return Err(ActivityError::Transient("gateway unavailable".to_string()));
        }

        if state.decline_charges || state.decline_users.contains(&user_id) {
            return Err(ActivityError::Permanent("payment declined".to_string()));
        }

        state.next_id += 1;
        let receipt = ChargeReceipt {
            payment_reference: format!("PAY-{:04}", state.next_id),
        };
        state
            .charges
            .insert(idempotency_key.to_string(), receipt.clone());

        Ok(receipt)
    }

    async fn refund(&self, payment_reference: &str) -> Result<RefundReceipt, ActivityError> {
        let mut state = self.state.write().unwrap();

        if state.fail_refunds {
            return Err(ActivityError::Transient("refund endpoint down".to_string()));
        }

        state.refunded.insert(payment_reference.to_string());
        Ok(RefundReceipt {
            payment_reference: payment_reference.to_string(),
        })
    }
}
