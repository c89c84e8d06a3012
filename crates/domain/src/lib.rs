//! Business records and value objects for the investment platform.
//!
//! This crate holds the records the orchestration subsystem produces and
//! consumes: investments, the append-only wallet ledger, and return
//! distribution batches, along with the fixed-share allocation used when
//! distributing returns across investors.

pub mod distribution;
pub mod error;
pub mod investment;
pub mod ledger;
pub mod value_objects;

pub use distribution::{
    DistributionBatch, DistributionResult, PayoutStatus, PlannedPayout, allocate_shares,
};
pub use error::DomainError;
pub use investment::{Investment, InvestmentStatus};
pub use ledger::WalletLedgerEntry;
pub use value_objects::{Money, PaymentMethod};
