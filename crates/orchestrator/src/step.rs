//! Step definitions for the two workflow shapes.
//!
//! Steps are tagged unions mapped at compile time to concrete handlers in
//! the coordinators, so there is no runtime lookup by name; the string
//! names exist only for invocation logging and idempotency keys.

use common::InvestmentId;

/// Steps of the investment-creation saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvestmentStep {
    /// Compliance gate; a rejection is terminal but not an error.
    VerifyCompliance,
    /// Charge the investor. Irreversible: compensated by a refund.
    ProcessPayment,
    /// Create the investment record backed by the settled charge.
    CreateInvestment,
    /// Append the charge credit to the wallet ledger.
    RecordLedgerTransaction,
    /// Append the investment debit to the wallet ledger.
    DebitWalletBalance,
    /// Allocate ownership shares through the external allocator.
    DistributeShares,
    /// Best-effort investor notification.
    NotifyInvestor,
}

impl InvestmentStep {
    /// The saga's steps in execution order.
    pub const SEQUENCE: [InvestmentStep; 7] = [
        InvestmentStep::VerifyCompliance,
        InvestmentStep::ProcessPayment,
        InvestmentStep::CreateInvestment,
        InvestmentStep::RecordLedgerTransaction,
        InvestmentStep::DebitWalletBalance,
        InvestmentStep::DistributeShares,
        InvestmentStep::NotifyInvestor,
    ];

    /// Step name used in invocation logs and idempotency keys.
    pub fn name(&self) -> &'static str {
        match self {
            InvestmentStep::VerifyCompliance => "verify_compliance",
            InvestmentStep::ProcessPayment => "process_payment",
            InvestmentStep::CreateInvestment => "create_investment",
            InvestmentStep::RecordLedgerTransaction => "record_ledger_transaction",
            InvestmentStep::DebitWalletBalance => "debit_wallet_balance",
            InvestmentStep::DistributeShares => "distribute_shares",
            InvestmentStep::NotifyInvestor => "notify_investor",
        }
    }

    /// Returns true if this step's side effect can only be undone by an
    /// explicit compensating activity.
    pub fn is_irreversible(&self) -> bool {
        matches!(self, InvestmentStep::ProcessPayment)
    }

    /// Name of the compensating activity for an irreversible step.
    pub fn compensation(&self) -> Option<&'static str> {
        match self {
            InvestmentStep::ProcessPayment => Some("refund_payment"),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvestmentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Steps of one investor's payout sub-saga within a distribution batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayoutStep {
    /// Disburse the investor's share through the gateway.
    ProcessPayment,
    /// Record the payout on the batch result.
    RecordTransaction,
    /// Append the payout credit to the investor's wallet ledger.
    CreditWalletBalance,
    /// Best-effort investor notification.
    NotifyInvestor,
}

impl PayoutStep {
    /// The sub-saga's steps in execution order.
    pub const SEQUENCE: [PayoutStep; 4] = [
        PayoutStep::ProcessPayment,
        PayoutStep::RecordTransaction,
        PayoutStep::CreditWalletBalance,
        PayoutStep::NotifyInvestor,
    ];

    /// Base step name.
    pub fn name(&self) -> &'static str {
        match self {
            PayoutStep::ProcessPayment => "payout_payment",
            PayoutStep::RecordTransaction => "payout_record",
            PayoutStep::CreditWalletBalance => "payout_credit",
            PayoutStep::NotifyInvestor => "payout_notify",
        }
    }

    /// Step name scoped to one investor's payout, so each sub-saga gets
    /// its own idempotency keys within the parent execution.
    pub fn scoped_name(&self, investment_id: InvestmentId) -> String {
        format!("{}:{}", self.name(), investment_id)
    }
}

impl std::fmt::Display for PayoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
