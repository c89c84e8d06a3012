//! Investment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{InvestmentId, PropertyId, UserId};

use crate::value_objects::Money;

/// Lifecycle state of an investment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    /// Awaiting share allocation.
    Pending,
    /// Fully settled and earning returns.
    Active,
    /// The owning workflow was compensated after creation.
    Failed,
}

impl InvestmentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Active => "active",
            InvestmentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The business record created as the successful outcome of an
/// investment-creation workflow.
///
/// Created only after the payment charge succeeds, never speculatively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub investor_id: UserId,
    pub property_id: PropertyId,
    pub amount: Money,
    /// Gateway reference of the charge that funded this investment.
    pub payment_reference: String,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Investment {
    /// Creates a new active investment backed by a settled payment.
    pub fn new(
        investor_id: UserId,
        property_id: PropertyId,
        amount: Money,
        payment_reference: impl Into<String>,
    ) -> Self {
        Self {
            id: InvestmentId::new(),
            investor_id,
            property_id,
            amount,
            payment_reference: payment_reference.into(),
            status: InvestmentStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the investment participates in return distributions.
    pub fn is_active(&self) -> bool {
        self.status == InvestmentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_investment_is_active() {
        let inv = Investment::new(
            UserId::new(),
            PropertyId::new(),
            Money::from_naira(50_000),
            "PAY-0001",
        );
        assert!(inv.is_active());
        assert_eq!(inv.payment_reference, "PAY-0001");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(InvestmentStatus::Pending.to_string(), "pending");
        assert_eq!(InvestmentStatus::Active.to_string(), "active");
        assert_eq!(InvestmentStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let inv = Investment::new(
            UserId::new(),
            PropertyId::new(),
            Money::from_kobo(123_00),
            "PAY-0002",
        );
        let json = serde_json::to_string(&inv).unwrap();
        let deserialized: Investment = serde_json::from_str(&json).unwrap();
        assert_eq!(inv, deserialized);
    }
}
