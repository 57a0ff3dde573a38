use chrono::{DateTime, Utc};

use crate::domain::calendar::ist;
use crate::port::inbound::runtime::{BalanceOrigin, HealthLevel};

use super::{format_uptime, TelegramControl};

fn ist_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&ist()).format("%Y-%m-%d %H:%M IST").to_string()
}

impl TelegramControl {
    pub(super) fn status_text(&self) -> String {
        let status = self.state.risk_status();

        let (state_emoji, state) = if status.halted {
            ("⏸️", "HALTED")
        } else if status.trading_allowed {
            ("▶️", "ACTIVE")
        } else {
            ("⏹️", "BLOCKED")
        };
        let market = if status.market_open { "open" } else { "closed" };

        let mut text = format!(
            "📊 Status\n\n\
            {} Trading: {}\n\
            🧭 Mode: {}\n\
            🏛️ Market: {}\n\
            ⏱️ Uptime: {}\n\n\
            📈 Today\n\
            • Trades: {}/{}\n\
            • Daily P&L: ₹{}\n\
            • Loss streak: {}",
            state_emoji,
            state,
            status.mode.as_str().to_uppercase(),
            market,
            format_uptime(self.started_at),
            status.trades_today,
            status.max_daily_trades,
            status.daily_pnl,
            status.consecutive_losses,
        );

        if let Some(reason) = &status.halt_reason {
            text.push_str(&format!("\n\n🛑 Halt reason: {reason}"));
        }

        match self.state.open_position() {
            Some(p) => text.push_str(&format!(
                "\n\n💼 Open position\n\
                • {} x{}\n\
                • Entry: ₹{}\n\
                • Stop: ₹{}\n\
                • Candles held: {}",
                p.symbol, p.quantity, p.entry_price, p.stop_loss, p.candle_count
            )),
            None => text.push_str("\n\n💼 No open position"),
        }

        text
    }

    pub(super) fn health_text(&self) -> String {
        let report = self.state.health();
        let (status_emoji, status) = match report.status {
            HealthLevel::Healthy => ("✅", "HEALTHY"),
            HealthLevel::Degraded => ("⚠️", "DEGRADED"),
        };

        let mut text = format!("🏥 Health Check: {status_emoji} {status}\n");
        for check in &report.checks {
            let mark = if check.ok { "✅" } else { "❌" };
            text.push_str(&format!("\n{mark} {}: {}", check.name, check.detail));
        }
        text.push_str(&format!("\n\n🕒 {}", ist_stamp(report.timestamp)));
        text
    }

    pub(super) fn risk_text(&self) -> String {
        let status = self.state.risk_status();
        let limits = self.state.risk_limits();
        let allowed = if status.trading_allowed { "✅ yes" } else { "❌ no" };

        format!(
            "🛡️ Risk\n\n\
            Trading allowed: {}\n\n\
            📈 Counters\n\
            • Trades: {}/{} ({} left)\n\
            • Loss streak: {}/{}\n\
            • Daily P&L: ₹{} (cap ₹{})\n\
            • Exposure: ₹{} (max ₹{})\n\n\
            ⚙️ Limits\n\
            • Lot size: {}\n\
            • Last reset: {}",
            allowed,
            status.trades_today,
            status.max_daily_trades,
            status.remaining_trades,
            status.consecutive_losses,
            status.max_consecutive_losses,
            status.daily_pnl,
            status.max_daily_loss,
            status.exposure,
            status.max_exposure,
            limits.lot_size,
            status
                .last_reset
                .map_or_else(|| "never".to_string(), |d| d.to_string()),
        )
    }

    pub(super) async fn balance_text(&self) -> String {
        let view = self.state.balance().await;
        let origin = match view.origin {
            BalanceOrigin::Virtual => "virtual",
            BalanceOrigin::Live => "live",
            BalanceOrigin::Cached => "cached",
            BalanceOrigin::Emergency => "fallback, broker unreachable",
        };
        format!("💰 Balance: ₹{} ({origin})", view.amount)
    }

    pub(super) fn token_text(&self) -> String {
        let token = self.state.token();
        if !token.present {
            return "🔑 No access token. Use /login to authenticate.".to_string();
        }

        let validity = if token.valid { "✅ valid" } else { "❌ expired" };
        format!(
            "🔑 Access token: {}\n\n\
            • Token: {}\n\
            • Issued: {}\n\
            • Expires: {}",
            validity,
            token.preview.unwrap_or_else(|| "***".to_string()),
            token.issued_at.map_or_else(|| "unknown".to_string(), ist_stamp),
            token.expires_at.map_or_else(|| "unknown".to_string(), ist_stamp),
        )
    }

    pub(super) fn login_text(&self) -> String {
        match self.state.start_login() {
            Ok(link) => format!(
                "🔐 Kite login\n\n\
                {}\n\n\
                ⏳ Link valid until {}",
                link.login_url,
                ist_stamp(link.expires_at)
            ),
            Err(err) => format!("⛔ {err}"),
        }
    }

    pub(super) fn mode_text(&self) -> String {
        let mode = self.state.mode();
        let detail = if mode.is_live() {
            "real orders on the exchange"
        } else if mode.uses_real_data() {
            "live market data, simulated fills"
        } else {
            "synthetic data, simulated fills"
        };
        format!("🧭 Mode: {} ({detail})", mode.as_str().to_uppercase())
    }
}
