//! Handler for the `status` command.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use crate::adapter::inbound::cli::command::DateArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::inbound::cli::run::load_config;
use crate::application::risk::{BalanceSource, RiskManager};
use crate::application::state::AppState;
use crate::domain::calendar::{ist_date, ist_instant};
use crate::error::Result;
use crate::infrastructure::bootstrap::open_store;
use crate::infrastructure::config::Config;
use crate::port::inbound::runtime::RiskStatus;
use crate::port::outbound::notifier::NotifierRegistry;
use crate::port::outbound::store::TradeStore;

/// 15:30 IST, when the counters of a past day are final.
const MARKET_CLOSE_SECS: u32 = 15 * 3600 + 30 * 60;

/// A risk manager over the database only: no broker and no notifiers.
pub(crate) struct OfflineRisk {
    pub store: Arc<dyn TradeStore>,
    pub risk: RiskManager,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
}

/// Open the database and rebuild the counters for `date` (today if `None`).
pub(crate) fn offline_risk(args: &DateArgs) -> Result<OfflineRisk> {
    let mut config: Config = load_config(&args.config.config)?;
    if let Some(db) = &args.db {
        config.database = db.display().to_string();
    }
    let store = open_store(&config)?;

    let now = Utc::now();
    let date = args.date.unwrap_or_else(|| ist_date(now));
    let at = if date == ist_date(now) {
        now
    } else {
        ist_instant(date, MARKET_CLOSE_SECS)
    };

    let state = Arc::new(AppState::new(config.mode, config.risk_limits()));
    let balance = Arc::new(BalanceSource::new(
        config.mode,
        None,
        config.risk.virtual_balance,
        config.risk.emergency_balance,
    ));
    let risk = RiskManager::new(
        state,
        Arc::clone(&store),
        Arc::new(NotifierRegistry::new()),
        config.market.calendar()?,
        balance,
    );
    risk.restore(at)?;
    Ok(OfflineRisk {
        store,
        risk,
        date,
        at,
    })
}

fn print_status(status: &RiskStatus) {
    output::section("Risk");
    output::field("Mode", status.mode);
    output::field(
        "Trading",
        if status.trading_allowed {
            output::positive("allowed")
        } else {
            output::negative("blocked")
        },
    );
    if let Some(reason) = &status.halt_reason {
        output::field("Halted", reason);
    }
    output::field(
        "Trades",
        format!("{}/{}", status.trades_today, status.max_daily_trades),
    );
    output::field(
        "Losses in a row",
        format!("{}/{}", status.consecutive_losses, status.max_consecutive_losses),
    );
    output::field(
        "Daily P&L",
        format!(
            "{} (limit {})",
            output::rupees(status.daily_pnl),
            status.max_daily_loss
        ),
    );
    output::field(
        "Exposure",
        format!("₹{} / ₹{}", status.exposure, status.max_exposure),
    );
    output::field(
        "Last reset",
        status
            .last_reset
            .map_or_else(|| output::muted("never"), |d| d.to_string()),
    );
}

/// Execute the status command.
pub async fn execute(args: &DateArgs) -> Result<()> {
    let offline = offline_risk(args)?;
    let status = offline.risk.risk_status(offline.at);
    let session = offline.store.session_for_date(offline.date)?;

    if output::is_json() {
        output::json_output(json!({
            "command": "status",
            "date": offline.date,
            "risk": status,
            "session": session,
        }));
        return Ok(());
    }

    output::field("Date", offline.date);
    print_status(&status);

    output::section("Session");
    match session {
        Some(session) => {
            output::field("Signals", session.total_signals);
            output::field("Opened", session.positions_opened);
            output::field("Closed", session.positions_closed);
            output::field("P&L", output::rupees(session.total_pnl));
            if !session.errors.is_empty() {
                output::field("Errors", session.errors.len());
            }
        }
        None => output::note("No session recorded for this date"),
    }
    Ok(())
}
