use rust_decimal::Decimal;
use thiserror::Error;

/// Domain-level validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid trading mode: {0} (expected test, paper or live)")]
    InvalidMode(String),

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(u32),

    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid option type: {0}")]
    InvalidOptionType(String),

    #[error("invalid exit reason: {0}")]
    InvalidExitReason(String),

    #[error("invalid position status: {0}")]
    InvalidPositionStatus(String),
}
