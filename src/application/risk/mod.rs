//! Risk management service module.
//!
//! Entry gating, daily counters, balance lookup and the end-of-day report.

pub mod balance;
pub mod manager;
pub mod report;
pub mod validate;

pub use balance::BalanceSource;
pub use manager::{RiskManager, RiskRequest};
pub use report::{Compliance, DailyReport};
pub use validate::{validate, validate_limits, CredentialPresence, RiskIssue};
