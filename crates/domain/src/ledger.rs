//! Append-only wallet ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::UserId;

use crate::value_objects::Money;

/// A single balance change on a user's wallet.
///
/// Entries are append-only: a wallet balance is always the running sum of
/// its entries, never a mutable field. `balance_after` is captured at
/// append time for audit, not consulted for balance reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletLedgerEntry {
    pub id: Uuid,
    pub user_id: UserId,
    /// Signed amount: credits positive, debits negative.
    pub amount: Money,
    /// What caused the change: a payment reference, an investment id, or
    /// a distribution batch id.
    pub reference_id: String,
    pub balance_after: Money,
    pub recorded_at: DateTime<Utc>,
}

impl WalletLedgerEntry {
    /// Creates a credit entry (positive amount).
    pub fn credit(
        user_id: UserId,
        amount: Money,
        reference_id: impl Into<String>,
        balance_after: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            reference_id: reference_id.into(),
            balance_after,
            recorded_at: Utc::now(),
        }
    }

    /// Creates a debit entry (negative amount).
    pub fn debit(
        user_id: UserId,
        amount: Money,
        reference_id: impl Into<String>,
        balance_after: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: amount.negated(),
            reference_id: reference_id.into(),
            balance_after,
            recorded_at: Utc::now(),
        }
    }

    /// Returns true if this entry increased the balance.
    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_entry_is_positive() {
        let entry = WalletLedgerEntry::credit(
            UserId::new(),
            Money::from_kobo(5000),
            "PAY-1",
            Money::from_kobo(5000),
        );
        assert!(entry.is_credit());
        assert_eq!(entry.amount.kobo(), 5000);
    }

    #[test]
    fn test_debit_entry_negates_amount() {
        let entry = WalletLedgerEntry::debit(
            UserId::new(),
            Money::from_kobo(5000),
            "INV-1",
            Money::zero(),
        );
        assert!(!entry.is_credit());
        assert_eq!(entry.amount.kobo(), -5000);
    }

    #[test]
    fn test_running_sum_matches_balance_after() {
        let user = UserId::new();
        let entries = [
            WalletLedgerEntry::credit(user, Money::from_kobo(1000), "a", Money::from_kobo(1000)),
            WalletLedgerEntry::debit(user, Money::from_kobo(400), "b", Money::from_kobo(600)),
            WalletLedgerEntry::credit(user, Money::from_kobo(250), "c", Money::from_kobo(850)),
        ];

        let balance: Money = entries.iter().map(|e| e.amount).sum();
        assert_eq!(balance, entries.last().unwrap().balance_after);
    }
}
