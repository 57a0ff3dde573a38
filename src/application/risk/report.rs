//! End-of-day risk report.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::state::RiskLimits;
use crate::domain::{Position, PositionStatus};
use crate::port::outbound::notifier::ReportEvent;
use crate::port::outbound::store::AlertRecord;

/// Whether the day stayed inside the configured limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compliance {
    pub max_trades_respected: bool,
    pub loss_limit_respected: bool,
    pub consecutive_losses_ok: bool,
}

impl Compliance {
    /// Number of rules respected, out of three.
    #[must_use]
    pub fn score(&self) -> u8 {
        u8::from(self.max_trades_respected)
            + u8::from(self.loss_limit_respected)
            + u8::from(self.consecutive_losses_ok)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_trades: u32,
    pub closed_trades: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percentage of closed trades that were wins.
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub compliance: Compliance,
    pub violations: Vec<String>,
}

impl DailyReport {
    /// Build the report from the day's persisted positions and violation alerts.
    ///
    /// `consecutive_losses` is the live counter at report time.
    #[must_use]
    pub fn build(
        date: NaiveDate,
        positions: &[Position],
        violations: &[AlertRecord],
        limits: &RiskLimits,
        consecutive_losses: u32,
    ) -> Self {
        let closed: Vec<Decimal> = positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .map(|p| p.pnl.unwrap_or(Decimal::ZERO))
            .collect();

        let wins: Vec<Decimal> = closed.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = closed.iter().copied().filter(|p| *p < Decimal::ZERO).collect();
        let total_pnl: Decimal = closed.iter().copied().sum();

        let win_rate = if closed.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(wins.len()) / Decimal::from(closed.len()) * Decimal::ONE_HUNDRED)
                .round_dp(2)
        };
        let average = |values: &[Decimal]| -> Decimal {
            let sum: Decimal = values.iter().copied().sum();
            (sum / Decimal::from(values.len().max(1))).round_dp(2)
        };

        let closed_count = count(closed.len());
        Self {
            date,
            total_trades: count(positions.len()),
            closed_trades: closed_count,
            wins: count(wins.len()),
            losses: count(losses.len()),
            win_rate,
            total_pnl,
            avg_win: average(&wins),
            avg_loss: average(&losses),
            compliance: Compliance {
                max_trades_respected: closed_count <= limits.max_daily_trades,
                loss_limit_respected: total_pnl >= limits.max_daily_loss,
                consecutive_losses_ok: consecutive_losses < limits.max_consecutive_losses,
            },
            violations: violations.iter().map(|a| a.message.clone()).collect(),
        }
    }

    #[must_use]
    pub fn to_event(&self) -> ReportEvent {
        ReportEvent {
            date: self.date,
            total_trades: self.total_trades,
            wins: self.wins,
            losses: self.losses,
            win_rate: self.win_rate,
            total_pnl: self.total_pnl,
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, NewPosition, OptionType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn closed(entry: Decimal, exit: Decimal) -> Position {
        let mut p = Position::open(
            NewPosition {
                symbol: "SENSEX2510975000CE".into(),
                option_type: OptionType::CE,
                strike: 75_000,
                entry_price: entry,
                entry_basis: dec!(75000),
                stop_loss: entry - dec!(20),
                quantity: 20,
            },
            Utc::now(),
        )
        .unwrap();
        p.close(exit, ExitReason::TimeExit, Utc::now());
        p
    }

    #[test]
    fn aggregates_wins_and_losses() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let positions = vec![
            closed(dec!(200), dec!(240)), // +800
            closed(dec!(200), dec!(190)), // -200
            closed(dec!(300), dec!(330)), // +600
        ];
        let report = DailyReport::build(date, &positions, &[], &RiskLimits::default(), 0);

        assert_eq!(report.total_trades, 3);
        assert_eq!(report.closed_trades, 3);
        assert_eq!(report.wins, 2);
        assert_eq!(report.losses, 1);
        assert_eq!(report.win_rate, dec!(66.67));
        assert_eq!(report.total_pnl, dec!(1200));
        assert_eq!(report.avg_win, dec!(700));
        assert_eq!(report.avg_loss, dec!(-200));
        assert_eq!(report.compliance.score(), 3);
    }

    #[test]
    fn empty_day_has_zero_rates() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let report = DailyReport::build(date, &[], &[], &RiskLimits::default(), 2);

        assert_eq!(report.win_rate, Decimal::ZERO);
        assert_eq!(report.avg_win, Decimal::ZERO);
        assert!(!report.compliance.consecutive_losses_ok);
    }
}
