//! Return distribution batches and the fixed-share allocation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use common::{ExecutionId, InvestmentId, PropertyId, UserId};

use crate::error::DomainError;
use crate::investment::Investment;
use crate::value_objects::Money;

/// Terminal state of one investor's payout within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Not yet attempted.
    Pending,
    /// Payout settled and credited.
    Paid,
    /// Payout failed; listed for manual follow-up.
    Failed,
}

impl PayoutStatus {
    /// Returns true if the payout has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One investor's share of a distribution, fixed at batch start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPayout {
    pub investment_id: InvestmentId,
    pub user_id: UserId,
    pub amount: Money,
}

/// The outcome of one investor's payout sub-saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub investment_id: InvestmentId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PayoutStatus,
    pub payment_reference: Option<String>,
    pub failure_reason: Option<String>,
}

impl DistributionResult {
    /// Creates a pending result from a planned payout.
    pub fn pending(plan: &PlannedPayout) -> Self {
        Self {
            investment_id: plan.investment_id,
            user_id: plan.user_id,
            amount: plan.amount,
            status: PayoutStatus::Pending,
            payment_reference: None,
            failure_reason: None,
        }
    }

    /// Marks the result paid with the settling payment reference.
    pub fn paid(mut self, payment_reference: impl Into<String>) -> Self {
        self.status = PayoutStatus::Paid;
        self.payment_reference = Some(payment_reference.into());
        self
    }

    /// Marks the result failed with a reason.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = PayoutStatus::Failed;
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Groups the per-investor payout results of one ROI distribution run.
///
/// The batch shares the id of the workflow execution that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBatch {
    pub id: ExecutionId,
    pub property_id: PropertyId,
    pub total_amount: Money,
    pub distribution_date: NaiveDate,
    pub results: Vec<DistributionResult>,
}

impl DistributionBatch {
    /// Creates a batch skeleton with all payouts pending.
    pub fn new(
        id: ExecutionId,
        property_id: PropertyId,
        total_amount: Money,
        distribution_date: NaiveDate,
        plan: &[PlannedPayout],
    ) -> Self {
        Self {
            id,
            property_id,
            total_amount,
            distribution_date,
            results: plan.iter().map(DistributionResult::pending).collect(),
        }
    }

    /// Sum of amounts actually paid out.
    pub fn paid_total(&self) -> Money {
        self.results
            .iter()
            .filter(|r| r.status == PayoutStatus::Paid)
            .map(|r| r.amount)
            .sum()
    }

    /// Results that need manual follow-up.
    pub fn failures(&self) -> impl Iterator<Item = &DistributionResult> {
        self.results
            .iter()
            .filter(|r| r.status == PayoutStatus::Failed)
    }

    /// Returns true once every payout has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.results.iter().all(|r| r.status.is_terminal())
    }
}

/// Computes each investor's fixed share of `total_amount`, pro-rata over
/// the active investments' amounts.
///
/// Shares are floored to whole kobo and the remainder is distributed one
/// kobo at a time to the largest stakes, so the allocated sum equals
/// `total_amount` exactly. The result is computed once at batch start and
/// never revised mid-run.
pub fn allocate_shares(
    total_amount: Money,
    investments: &[Investment],
) -> Result<Vec<PlannedPayout>, DomainError> {
    if !total_amount.is_positive() {
        return Err(DomainError::InvalidAmount(format!(
            "distribution total must be positive, got {total_amount}"
        )));
    }

    let active: Vec<&Investment> = investments.iter().filter(|i| i.is_active()).collect();
    let pool: i64 = active.iter().map(|i| i.amount.kobo()).sum();
    if active.is_empty() || pool <= 0 {
        let property_id = investments
            .first()
            .map(|i| i.property_id)
            .unwrap_or_default();
        return Err(DomainError::NoActiveInvestments(property_id));
    }

    let total = total_amount.kobo() as i128;
    let mut payouts: Vec<(PlannedPayout, i128)> = active
        .iter()
        .map(|inv| {
            let stake = inv.amount.kobo() as i128;
            let exact = total * stake;
            let share = exact / pool as i128;
            let remainder = exact % pool as i128;
            (
                PlannedPayout {
                    investment_id: inv.id,
                    user_id: inv.investor_id,
                    amount: Money::from_kobo(share as i64),
                },
                remainder,
            )
        })
        .collect();

    // Hand out the leftover kobo to the largest fractional remainders.
    let allocated: i64 = payouts.iter().map(|(p, _)| p.amount.kobo()).sum();
    let mut leftover = total_amount.kobo() - allocated;
    let mut order: Vec<usize> = (0..payouts.len()).collect();
    order.sort_by(|&a, &b| payouts[b].1.cmp(&payouts[a].1));
    for idx in order {
        if leftover == 0 {
            break;
        }
        let (payout, _) = &mut payouts[idx];
        payout.amount = payout.amount + Money::from_kobo(1);
        leftover -= 1;
    }

    Ok(payouts.into_iter().map(|(p, _)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn investment(property_id: PropertyId, naira: i64) -> Investment {
        Investment::new(
            UserId::new(),
            property_id,
            Money::from_naira(naira),
            format!("PAY-{naira}"),
        )
    }

    #[test]
    fn test_shares_follow_stake_proportions() {
        let property_id = PropertyId::new();
        // Stakes of 50%, 30% and 20% of the pool.
        let investments = vec![
            investment(property_id, 500_000),
            investment(property_id, 300_000),
            investment(property_id, 200_000),
        ];

        let payouts = allocate_shares(Money::from_naira(1_000_000), &investments).unwrap();

        assert_eq!(payouts[0].amount, Money::from_naira(500_000));
        assert_eq!(payouts[1].amount, Money::from_naira(300_000));
        assert_eq!(payouts[2].amount, Money::from_naira(200_000));
    }

    #[test]
    fn test_share_sum_equals_total_despite_rounding() {
        let property_id = PropertyId::new();
        // Three equal stakes dividing a total that is not divisible by 3.
        let investments = vec![
            investment(property_id, 100),
            investment(property_id, 100),
            investment(property_id, 100),
        ];

        let total = Money::from_kobo(1_000_001);
        let payouts = allocate_shares(total, &investments).unwrap();

        let allocated: Money = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(allocated, total);

        // No share drifts more than one kobo from the exact split.
        for payout in &payouts {
            let diff = payout.amount.kobo() - total.kobo() / 3;
            assert!(diff.abs() <= 1, "share off by {diff} kobo");
        }
    }

    #[test]
    fn test_inactive_investments_are_excluded() {
        let property_id = PropertyId::new();
        let mut failed = investment(property_id, 500_000);
        failed.status = crate::investment::InvestmentStatus::Failed;
        let investments = vec![investment(property_id, 500_000), failed];

        let payouts = allocate_shares(Money::from_naira(100_000), &investments).unwrap();

        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount, Money::from_naira(100_000));
    }

    #[test]
    fn test_no_active_investments_is_an_error() {
        let result = allocate_shares(Money::from_naira(100), &[]);
        assert!(matches!(result, Err(DomainError::NoActiveInvestments(_))));
    }

    #[test]
    fn test_non_positive_total_is_rejected() {
        let property_id = PropertyId::new();
        let investments = vec![investment(property_id, 100)];
        let result = allocate_shares(Money::zero(), &investments);
        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[test]
    fn test_batch_settlement_tracking() {
        let property_id = PropertyId::new();
        let investments = vec![
            investment(property_id, 600),
            investment(property_id, 400),
        ];
        let plan = allocate_shares(Money::from_naira(1_000), &investments).unwrap();
        let mut batch = DistributionBatch::new(
            ExecutionId::new(),
            property_id,
            Money::from_naira(1_000),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            &plan,
        );

        assert!(!batch.is_settled());

        batch.results[0] = batch.results[0].clone().paid("PAY-A");
        batch.results[1] = batch.results[1].clone().failed("gateway declined");

        assert!(batch.is_settled());
        assert_eq!(batch.paid_total(), Money::from_naira(600));
        assert_eq!(batch.failures().count(), 1);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let property_id = PropertyId::new();
        let investments = vec![investment(property_id, 250)];
        let plan = allocate_shares(Money::from_naira(500), &investments).unwrap();
        let batch = DistributionBatch::new(
            ExecutionId::new(),
            property_id,
            Money::from_naira(500),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            &plan,
        );

        let json = serde_json::to_string(&batch).unwrap();
        let deserialized: DistributionBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, deserialized);
    }
}
