pub mod types;

pub use types::{ExecutionId, InvestmentId, PropertyId, UserId};
