//! Risk check types for trade validation.
//!
//! The rules themselves live in `application::risk::RiskManager`.

use crate::domain::money::Quantity;
use crate::error::RiskError;

/// Result of a risk check for a proposed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskCheckResult {
    /// Entry may proceed with `quantity`, which can be smaller than requested
    /// when the live balance only covers part of the order.
    Approved { quantity: Quantity, reason: String },

    /// Entry is rejected due to a risk limit violation.
    Rejected(RiskError),
}

impl RiskCheckResult {
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, RiskCheckResult::Approved { .. })
    }

    /// Approved quantity, or `None` when rejected.
    #[must_use]
    pub const fn quantity(&self) -> Option<Quantity> {
        match self {
            RiskCheckResult::Approved { quantity, .. } => Some(*quantity),
            RiskCheckResult::Rejected(_) => None,
        }
    }

    #[must_use]
    pub const fn rejection_error(&self) -> Option<&RiskError> {
        match self {
            RiskCheckResult::Rejected(e) => Some(e),
            RiskCheckResult::Approved { .. } => None,
        }
    }
}
