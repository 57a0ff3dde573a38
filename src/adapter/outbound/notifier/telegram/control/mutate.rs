use rust_decimal::Decimal;
use tracing::warn;

use crate::port::inbound::runtime::RuntimeRiskLimitKind;

use super::TelegramControl;

const PAUSE_REASON: &str = "paused via Telegram";
const EMERGENCY_REASON: &str = "emergency stop via Telegram";

impl TelegramControl {
    pub(super) fn set_risk_text(&self, kind: RuntimeRiskLimitKind, value: Decimal) -> String {
        match self.state.set_risk_limit(kind, value) {
            Ok(limits) => format!(
                "✅ Updated {}\n\n\
                ⚙️ Current limits:\n\
                • 🔢 max_trades: {}\n\
                • 📉 max_losses: {}\n\
                • 💸 max_loss: ₹{}\n\
                • 💼 max_exposure: ₹{}\n\
                • 📦 lot_size: {}",
                kind.as_str(),
                limits.max_daily_trades,
                limits.max_consecutive_losses,
                limits.max_daily_loss,
                limits.max_exposure,
                limits.lot_size
            ),
            Err(err) => format!("❌ Error: cannot update {}: {}", kind.as_str(), err),
        }
    }

    pub(super) fn pause_text(&self) -> String {
        let status = self.state.risk_status();
        if status.halted {
            let reason = status.halt_reason.unwrap_or_else(|| "unknown".to_string());
            return format!("⏸️ Already paused: {reason}");
        }

        self.state.pause(PAUSE_REASON);
        "⏸️ Trading paused. Open positions are still managed.".to_string()
    }

    pub(super) fn resume_text(&self) -> String {
        if !self.state.risk_status().halted {
            return "▶️ Trading already active".to_string();
        }

        self.state.resume();
        "▶️ Trading resumed".to_string()
    }

    pub(super) fn emergency_stop_text(&self) -> String {
        let before = self.state.emergency_stop(EMERGENCY_REASON);
        warn!(
            trades_today = before.trades_today,
            daily_pnl = %before.daily_pnl,
            "Emergency stop requested from Telegram"
        );
        format!(
            "🚨 EMERGENCY STOP\n\n\
            All new entries halted.\n\
            • Trades today: {}\n\
            • Daily P&L: ₹{}\n\n\
            Use /resume to continue.",
            before.trades_today, before.daily_pnl
        )
    }

    pub(super) fn risk_reset_text(&self) -> String {
        match self.state.reset_risk() {
            Ok(status) => format!(
                "🔄 Daily risk counters reset\n\n\
                • Trades: {}/{}\n\
                • Loss streak: {}\n\
                • Daily P&L: ₹{}",
                status.trades_today,
                status.max_daily_trades,
                status.consecutive_losses,
                status.daily_pnl
            ),
            Err(err) => format!("❌ Error: {err}"),
        }
    }
}
