//! Message formatting for Telegram notifications.

use rust_decimal::Decimal;

use crate::domain::calendar::ist;
use crate::port::outbound::notifier::Event;

use super::notifier::TelegramConfig;

/// Format an event into a Telegram message, or None if the event should be skipped.
pub fn format_event_message(event: &Event, config: &TelegramConfig) -> Option<String> {
    match event {
        Event::SignalDetected(e) if config.notify_signals => {
            let target = match (&e.symbol, e.option_type, e.strike) {
                (Some(symbol), _, _) => symbol.clone(),
                (None, Some(kind), Some(strike)) => format!("{strike} {kind}"),
                _ => "SENSEX".to_string(),
            };
            Some(format!(
                "🎯 *Signal Detected*\n\
                \n\
                📋 {}\n\
                📈 Confidence: `{:.0}%`\n\
                💵 Entry: `₹{:.2}`\n\
                🛑 Stop: `₹{:.2}`",
                escape_markdown(&target),
                e.confidence * 100.0,
                e.entry_price,
                e.stop_loss
            ))
        }
        Event::PositionOpened(e) => Some(format!(
            "🟢 *Position Opened* \\[{}\\]\n\
            \n\
            📋 `{}`\n\
            🎯 {} {}\n\
            📦 Qty: `{}`\n\
            💵 Entry: `₹{}`\n\
            🛑 Stop: `₹{}`\n\
            🔢 Trade `{}` today, `{}` remaining",
            escape_markdown(&e.mode.as_str().to_uppercase()),
            e.symbol,
            e.strike,
            e.option_type,
            e.quantity,
            e.entry_price,
            e.stop_loss,
            e.trade_number,
            e.remaining_trades
        )),
        Event::PositionClosed(e) => {
            let emoji = if e.pnl >= Decimal::ZERO { "✅" } else { "🔻" };
            Some(format!(
                "{} *Position Closed*\n\
                \n\
                📋 `{}`\n\
                📦 Qty: `{}`\n\
                💵 `₹{}` → `₹{}`\n\
                💰 P&L: `{}`\n\
                🏷️ Reason: {}\n\
                📊 Day P&L: `{}`\n\
                📉 Loss streak: `{}`",
                emoji,
                e.symbol,
                e.quantity,
                e.entry_price,
                e.exit_price,
                signed_rupees(e.pnl),
                escape_markdown(e.reason.as_str()),
                signed_rupees(e.daily_pnl),
                e.consecutive_losses
            ))
        }
        Event::RiskRejected(e) if config.notify_risk_rejections => Some(format!(
            "⚠️ *Risk Check Failed*\n\
            \n\
            📋 `{}`\n\
            🚫 {}",
            truncate(&e.symbol, 32),
            escape_markdown(&e.reason)
        )),
        Event::TradingHalted { reason } => Some(format!(
            "🛑 *Trading Halted*\n\
            \n\
            ⚠️ Reason: {}",
            escape_markdown(reason)
        )),
        Event::TradingResumed => Some("▶️ *Trading Resumed*".to_string()),
        Event::AuthLoginRequested(e) => Some(format!(
            "🔐 *Kite Login Required*\n\
            \n\
            [Open login page]({})\n\
            ⏳ Expires `{}` IST",
            escape_link(&e.login_url),
            ist_time(e.expires_at)
        )),
        Event::AuthCompleted(e) => Some(format!(
            "🔑 *Login Successful*\n\
            \n\
            👤 User: `{}`\n\
            🧭 Mode: {}\n\
            🔒 Token: `{}`\n\
            ⏳ Valid until `{}` IST",
            e.user_id,
            escape_markdown(&e.mode.as_str().to_uppercase()),
            e.token_preview,
            ist_time(e.expires_at)
        )),
        Event::AuthFailed { state, reason } => Some(format!(
            "❌ *Login Failed*\n\
            \n\
            🆔 `{}`\n\
            🚫 {}",
            truncate(state, 12),
            escape_markdown(reason)
        )),
        Event::DailyReport(e) => Some(format!(
            "📊 *Daily Report {}*\n\
            \n\
            📈 Trades: `{}`\n\
            ✅ Wins: `{}`\n\
            🔻 Losses: `{}`\n\
            🎯 Win rate: `{}%`\n\
            💰 P&L: `{}`",
            escape_markdown(&e.date.to_string()),
            e.total_trades,
            e.wins,
            e.losses,
            e.win_rate,
            signed_rupees(e.total_pnl)
        )),
        Event::DataCollected(e) => Some(format!(
            "🗂 *Data Collected {}*\n\
            \n\
            📁 Files: `{}/{}`\n\
            🎯 ATM: `{}`\n\
            📉 SENSEX: `{}` → `{}`",
            escape_markdown(&e.date.to_string()),
            e.files,
            e.expected,
            e.atm_strike,
            escape_markdown(&e.sensex_open.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))),
            escape_markdown(&e.sensex_close.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}")))
        )),
        Event::SystemError { context, message } => Some(format!(
            "🚨 *System Error*\n\
            \n\
            📍 {}\n\
            📝 {}",
            escape_markdown(context),
            escape_markdown(&truncate(message, 200))
        )),
        _ => None,
    }
}

fn signed_rupees(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-₹{}", amount.abs())
    } else {
        format!("+₹{amount}")
    }
}

fn ist_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.with_timezone(&ist()).format("%H:%M").to_string()
}

/// Truncate a string with ellipsis (Unicode-safe).
pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

/// Escape special characters for Telegram `MarkdownV2`.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        if special_chars.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }

    result
}

/// Escape a URL inside a `MarkdownV2` inline link target.
fn escape_link(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}
