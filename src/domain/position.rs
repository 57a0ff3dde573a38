//! Option positions held by the bot.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::money::{Price, Quantity};
use super::signal::{ExitReason, OptionType};

/// Lifecycle of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Order sent, fill not yet confirmed.
    Pending,
    Open,
    Closed,
}

impl PositionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }

    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            other => Err(DomainError::InvalidPositionStatus(other.to_string())),
        }
    }
}

/// A single-leg option position.
///
/// `entry_basis` is the SENSEX level at the time of entry; `stop_loss` is
/// expressed in option premium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Database row id once persisted.
    pub id: Option<i64>,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: u32,
    pub entry_price: Price,
    pub entry_time: DateTime<Utc>,
    pub entry_basis: Price,
    pub stop_loss: Price,
    pub quantity: Quantity,
    pub status: PositionStatus,
    pub exit_price: Option<Price>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    /// Bars observed since entry.
    pub candle_count: u32,
    pub pnl: Option<Price>,
    pub order_id: Option<String>,
}

/// Parameters for opening a position.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: u32,
    pub entry_price: Price,
    pub entry_basis: Price,
    pub stop_loss: Price,
    pub quantity: Quantity,
}

impl Position {
    /// Open a position at `at`.
    ///
    /// # Errors
    /// Rejects a zero quantity or a non-positive entry price.
    pub fn open(params: NewPosition, at: DateTime<Utc>) -> Result<Self, DomainError> {
        if params.quantity == 0 {
            return Err(DomainError::NonPositiveQuantity(params.quantity));
        }
        if params.entry_price <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice(params.entry_price));
        }
        Ok(Self {
            id: None,
            symbol: params.symbol,
            option_type: params.option_type,
            strike: params.strike,
            entry_price: params.entry_price,
            entry_time: at,
            entry_basis: params.entry_basis,
            stop_loss: params.stop_loss,
            quantity: params.quantity,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            candle_count: 0,
            pnl: None,
            order_id: None,
        })
    }

    /// Notional value at entry.
    #[must_use]
    pub fn position_value(&self) -> Price {
        self.entry_price * Decimal::from(self.quantity)
    }

    /// Close the position and return the realised P&L.
    pub fn close(&mut self, exit_price: Price, reason: ExitReason, at: DateTime<Utc>) -> Price {
        let pnl = (exit_price - self.entry_price) * Decimal::from(self.quantity);
        self.exit_price = Some(exit_price);
        self.exit_time = Some(at);
        self.exit_reason = Some(reason);
        self.pnl = Some(pnl);
        self.status = PositionStatus::Closed;
        pnl
    }

    /// Unrealised P&L at `mark`.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Price) -> Price {
        (mark - self.entry_price) * Decimal::from(self.quantity)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// A closed position with a strictly negative result.
    #[must_use]
    pub fn is_loss(&self) -> bool {
        self.pnl.is_some_and(|p| p < Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> NewPosition {
        NewPosition {
            symbol: "SENSEX2510975000CE".to_string(),
            option_type: OptionType::CE,
            strike: 75_000,
            entry_price: dec!(250.50),
            entry_basis: dec!(75123.45),
            stop_loss: dec!(230),
            quantity: 20,
        }
    }

    #[test]
    fn open_rejects_bad_inputs() {
        let at = Utc::now();
        let mut p = params();
        p.quantity = 0;
        assert_eq!(
            Position::open(p, at).unwrap_err(),
            DomainError::NonPositiveQuantity(0)
        );

        let mut p = params();
        p.entry_price = dec!(0);
        assert!(matches!(
            Position::open(p, at),
            Err(DomainError::NonPositivePrice(_))
        ));
    }

    #[test]
    fn close_computes_pnl() {
        let mut position = Position::open(params(), Utc::now()).unwrap();
        assert_eq!(position.position_value(), dec!(5010.00));

        let pnl = position.close(dec!(240.50), ExitReason::StopLoss, Utc::now());
        assert_eq!(pnl, dec!(-200.00));
        assert_eq!(position.status, PositionStatus::Closed);
        assert_eq!(position.exit_reason, Some(ExitReason::StopLoss));
        assert!(position.is_loss());
    }

    #[test]
    fn status_parses_from_storage_strings() {
        assert_eq!(
            "OPEN".parse::<PositionStatus>().unwrap(),
            PositionStatus::Open
        );
        assert!("open".parse::<PositionStatus>().is_err());
    }
}
