//! Value objects shared across the investment domain.

use serde::{Deserialize, Serialize};

/// Money amount represented in kobo to avoid floating point issues.
///
/// Amounts are signed: ledger debits are negative, credits positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in kobo (e.g., 100_000 = ₦1,000.00)
    kobo: i64,
}

impl Money {
    /// Creates a new Money amount from kobo.
    pub fn from_kobo(kobo: i64) -> Self {
        Self { kobo }
    }

    /// Creates a new Money amount from a whole-naira value.
    pub fn from_naira(naira: i64) -> Self {
        Self { kobo: naira * 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { kobo: 0 }
    }

    /// Returns the amount in kobo.
    pub fn kobo(&self) -> i64 {
        self.kobo
    }

    /// Returns the naira portion (whole number).
    pub fn naira(&self) -> i64 {
        self.kobo / 100
    }

    /// Returns the kobo portion (remainder after naira).
    pub fn kobo_part(&self) -> i64 {
        self.kobo.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.kobo > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.kobo == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.kobo < 0
    }

    /// Returns the amount with its sign flipped.
    pub fn negated(&self) -> Money {
        Money { kobo: -self.kobo }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kobo < 0 {
            write!(f, "-₦{}.{:02}", self.naira().abs(), self.kobo_part())
        } else {
            write!(f, "₦{}.{:02}", self.naira(), self.kobo_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            kobo: self.kobo + rhs.kobo,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            kobo: self.kobo - rhs.kobo,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.kobo += rhs.kobo;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.kobo -= rhs.kobo;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// How an investor funds a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Debit/credit card via the gateway.
    Card,
    /// Direct bank transfer.
    BankTransfer,
    /// Platform wallet balance.
    Wallet,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
