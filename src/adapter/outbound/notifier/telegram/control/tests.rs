use super::super::command::TelegramCommand;
use super::*;
use chrono::Duration;
use rust_decimal_macros::dec;

use crate::domain::TradingMode;
use crate::port::inbound::runtime::{RuntimeRiskLimitKind, TokenView};
use crate::testkit::domain::{market_hours, open_position};
use crate::testkit::runtime::StubRuntime;

fn control_for(mode: TradingMode) -> (Arc<StubRuntime>, TelegramControl) {
    let state = Arc::new(StubRuntime::new(mode));
    let control = TelegramControl::new(Arc::clone(&state) as Arc<dyn RuntimeState>);
    (state, control)
}

#[test]
fn uptime_is_zero_padded() {
    let started = Utc::now() - Duration::seconds(3 * 3600 + 7 * 60 + 5);
    let uptime = format_uptime(started);
    assert!(uptime.starts_with("03:07:0"), "{uptime}");
}

#[tokio::test]
async fn status_shows_mode_counters_and_no_position() {
    let (state, control) = control_for(TradingMode::Paper);
    state.set_trades_today(1);

    let text = control.execute(TelegramCommand::Status).await;
    assert!(text.contains("📊 Status"));
    assert!(text.contains("Mode: PAPER"));
    assert!(text.contains("Trades: 1/3"));
    assert!(text.contains("No open position"));
}

#[tokio::test]
async fn status_lists_open_position() {
    let (state, control) = control_for(TradingMode::Test);
    let mut position = open_position(dec!(214.5), 20, market_hours());
    position.symbol = "SENSEX2510975000CE".to_string();
    state.set_position(Some(position));

    let text = control.execute(TelegramCommand::Status).await;
    assert!(text.contains("SENSEX2510975000CE x20"));
    assert!(text.contains("Entry: ₹214.5"));
}

#[tokio::test]
async fn pause_then_resume_round_trip() {
    let (state, control) = control_for(TradingMode::Test);

    let paused = control.execute(TelegramCommand::Pause).await;
    assert!(paused.contains("Trading paused"));
    assert_eq!(state.halt_reason().as_deref(), Some("paused via Telegram"));

    let again = control.execute(TelegramCommand::Pause).await;
    assert!(again.contains("Already paused"));

    let status = control.execute(TelegramCommand::Status).await;
    assert!(status.contains("HALTED"));
    assert!(status.contains("Halt reason: paused via Telegram"));

    let resumed = control.execute(TelegramCommand::Resume).await;
    assert!(resumed.contains("Trading resumed"));
    assert!(state.halt_reason().is_none());

    let idle = control.execute(TelegramCommand::Resume).await;
    assert!(idle.contains("already active"));
}

#[tokio::test]
async fn emergency_stop_halts_and_reports_prior_state() {
    let (state, control) = control_for(TradingMode::Live);
    state.set_trades_today(2);

    let text = control.execute(TelegramCommand::EmergencyStop).await;
    assert!(text.contains("EMERGENCY STOP"));
    assert!(text.contains("Trades today: 2"));
    assert_eq!(
        state.halt_reason().as_deref(),
        Some("emergency stop via Telegram")
    );
}

#[tokio::test]
async fn risk_reset_respects_config() {
    let (state, control) = control_for(TradingMode::Test);
    state.set_trades_today(3);

    let reset = control.execute(TelegramCommand::RiskReset).await;
    assert!(reset.contains("Trades: 0/3"));

    state.set_manual_reset(false);
    let refused = control.execute(TelegramCommand::RiskReset).await;
    assert!(refused.contains("manual reset disabled"));
}

#[tokio::test]
async fn set_risk_reports_all_limits() {
    let (_, control) = control_for(TradingMode::Test);

    let text = control
        .execute(TelegramCommand::SetRisk {
            kind: RuntimeRiskLimitKind::MaxTrades,
            value: dec!(5),
        })
        .await;
    assert!(text.contains("Updated max_trades"));
    assert!(text.contains("max_trades: 5"));
    assert!(text.contains("lot_size: 20"));

    let loss = control
        .execute(TelegramCommand::SetRisk {
            kind: RuntimeRiskLimitKind::MaxLoss,
            value: dec!(2500),
        })
        .await;
    assert!(loss.contains("max_loss: ₹-2500"));
}

#[tokio::test]
async fn set_risk_error_is_reported() {
    let (_, control) = control_for(TradingMode::Test);

    let text = control
        .execute(TelegramCommand::SetRisk {
            kind: RuntimeRiskLimitKind::MaxLoss,
            value: dec!(0),
        })
        .await;
    assert!(text.contains("cannot update max_loss"));
}

#[tokio::test]
async fn login_is_refused_outside_window() {
    let (state, control) = control_for(TradingMode::Live);

    let link = control.execute(TelegramCommand::Login).await;
    assert!(link.contains("https://kite.zerodha.com/connect/login"));

    state.set_login_open(false);
    let refused = control.execute(TelegramCommand::Login).await;
    assert!(refused.contains("only available 09:00-15:30 IST"));
    assert!(!refused.contains("https://"));
}

#[tokio::test]
async fn token_command_never_shows_full_token() {
    let (state, control) = control_for(TradingMode::Live);

    let missing = control.execute(TelegramCommand::Token).await;
    assert!(missing.contains("No access token"));

    state.set_token(TokenView {
        present: true,
        preview: Some("abcd1234...".to_string()),
        issued_at: Some(market_hours()),
        expires_at: Some(market_hours() + Duration::hours(20)),
        valid: true,
    });
    let text = control.execute(TelegramCommand::Token).await;
    assert!(text.contains("valid"));
    assert!(text.contains("abcd1234..."));
    assert!(text.contains("IST"));
}

#[tokio::test]
async fn health_lists_each_check() {
    let (state, control) = control_for(TradingMode::Test);

    let text = control.execute(TelegramCommand::Health).await;
    assert!(text.contains("DEGRADED"));
    assert!(text.contains("❌ access_token: missing"));
    assert!(text.contains("✅ database: ok"));

    state.pause("test");
    let halted = control.execute(TelegramCommand::Health).await;
    assert!(halted.contains("❌ trading: halted"));
}

#[tokio::test]
async fn balance_and_mode_describe_origin() {
    let (_, control) = control_for(TradingMode::Paper);

    let balance = control.execute(TelegramCommand::Balance).await;
    assert_eq!(balance, "💰 Balance: ₹100000 (virtual)");

    let mode = control.execute(TelegramCommand::Mode).await;
    assert!(mode.contains("PAPER"));
    assert!(mode.contains("simulated fills"));
}

#[tokio::test]
async fn risk_shows_remaining_trades() {
    let (state, control) = control_for(TradingMode::Test);
    state.set_trades_today(2);

    let text = control.execute(TelegramCommand::Risk).await;
    assert!(text.contains("Trades: 2/3 (1 left)"));
    assert!(text.contains("Trading allowed: ✅ yes"));
    assert!(text.contains("Last reset: never"));
}
