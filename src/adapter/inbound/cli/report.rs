//! Handler for the `report` command.

use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use crate::adapter::inbound::cli::command::DateArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::inbound::cli::status::offline_risk;
use crate::application::risk::DailyReport;
use crate::domain::calendar::ist;
use crate::domain::Position;
use crate::error::Result;

#[derive(Debug, Tabled, Serialize)]
pub(crate) struct PositionRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Qty")]
    quantity: u32,
    #[tabled(rename = "Entry")]
    entry: String,
    #[tabled(rename = "Exit")]
    exit: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "P&L")]
    pnl: String,
}

impl From<&Position> for PositionRow {
    fn from(p: &Position) -> Self {
        let exit = match (p.exit_price, p.exit_time) {
            (Some(price), Some(at)) => {
                format!("{price} @ {}", at.with_timezone(&ist()).format("%H:%M"))
            }
            _ => "-".to_string(),
        };
        Self {
            symbol: p.symbol.clone(),
            quantity: p.quantity,
            entry: format!(
                "{} @ {}",
                p.entry_price,
                p.entry_time.with_timezone(&ist()).format("%H:%M")
            ),
            exit,
            reason: p
                .exit_reason
                .map_or_else(|| p.status.to_string(), |r| r.to_string()),
            pnl: p.pnl.map_or_else(|| "-".to_string(), |pnl| pnl.to_string()),
        }
    }
}

fn print_report(report: &DailyReport) {
    output::section(&format!("Daily report {}", report.date));
    output::field(
        "Trades",
        format!("{} ({} closed)", report.total_trades, report.closed_trades),
    );
    output::field(
        "Wins / losses",
        format!("{} / {}", report.wins, report.losses),
    );
    output::field("Win rate", format!("{}%", report.win_rate.round_dp(1)));
    output::field("Total P&L", output::rupees(report.total_pnl));
    output::field("Avg win", output::rupees(report.avg_win));
    output::field("Avg loss", output::rupees(report.avg_loss));
    output::field(
        "Compliance",
        format!("{}/3", report.compliance.score()),
    );
    for violation in &report.violations {
        output::warning(violation);
    }
}

/// Execute the report command.
pub async fn execute(args: &DateArgs) -> Result<()> {
    let offline = offline_risk(args)?;
    let report = offline.risk.daily_report(offline.date)?;
    let positions = offline.store.positions_for_date(offline.date)?;
    let rows: Vec<PositionRow> = positions.iter().map(PositionRow::from).collect();

    if output::is_json() {
        output::json_output(json!({
            "command": "report",
            "report": report,
            "positions": rows,
        }));
        return Ok(());
    }

    print_report(&report);
    if rows.is_empty() {
        output::note("No positions for this date");
    } else {
        output::section("Positions");
        output::table(&rows);
    }
    Ok(())
}
