//! Domain error types.

use thiserror::Error;

use common::PropertyId;

/// Errors raised by domain-level validation.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An amount that must be strictly positive was not.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A distribution was requested for a property with no active investments.
    #[error("No active investments for property {0}")]
    NoActiveInvestments(PropertyId),
}
