//! Risk counters across restarts and trading days, backed by SQLite.

mod harness;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use harness::recording_notifier::RecordingNotifier;
use harness::temp_db::TempDb;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sensexbot::application::risk::{BalanceSource, RiskManager, RiskRequest};
use sensexbot::application::state::{AppState, RiskLimits};
use sensexbot::domain::{ExitReason, MarketCalendar, TradingMode};
use sensexbot::error::RiskError;
use sensexbot::port::inbound::risk::RiskCheckResult;
use sensexbot::port::outbound::notifier::Event;
use sensexbot::port::outbound::store::TradeStore;
use sensexbot::testkit::domain::{date, ist, market_hours, open_position, trading_day};

fn manager(store: Arc<dyn TradeStore>, notifier: &RecordingNotifier) -> RiskManager {
    let limits = RiskLimits::default();
    let balance = BalanceSource::new(
        TradingMode::Test,
        None,
        limits.virtual_balance,
        limits.emergency_balance,
    );
    RiskManager::new(
        Arc::new(AppState::new(TradingMode::Test, limits)),
        store,
        notifier.registry(),
        MarketCalendar::default(),
        Arc::new(balance),
    )
}

fn request() -> RiskRequest {
    RiskRequest {
        symbol: "SENSEX2510975000CE".into(),
        price: dec!(200),
        quantity: 20,
    }
}

/// Open a 20-lot call at 200 and close it at `exit`.
async fn round_trip(risk: &RiskManager, at: DateTime<Utc>, exit: Decimal) {
    let approved = risk.can_open_position(&request(), at).await;
    assert!(approved.is_approved(), "entry at {at} rejected: {approved:?}");

    let mut position = open_position(dec!(200), 20, at);
    risk.record_position_opened(&mut position).unwrap();
    let pnl = position.close(exit, ExitReason::StopLoss, at + Duration::minutes(9));
    risk.record_position_closed(&position, pnl).unwrap();
}

#[tokio::test]
async fn restart_restores_loss_streak_from_database() {
    let db = TempDb::create();
    let events = RecordingNotifier::new();
    let risk = manager(db.store(), &events);

    round_trip(&risk, market_hours(), dec!(190)).await;
    round_trip(&risk, market_hours() + Duration::minutes(30), dec!(180)).await;
    assert!(risk.state().is_halted());
    assert_eq!(
        events.count(|e| matches!(e, Event::TradingHalted { .. })),
        1
    );

    let restarted = manager(db.reopen(), &RecordingNotifier::new());
    let later = ist(trading_day(), 12, 0);
    restarted.restore(later).unwrap();

    let status = restarted.risk_status(later);
    assert_eq!(status.trades_today, 2);
    assert_eq!(status.consecutive_losses, 2);
    assert_eq!(status.daily_pnl, dec!(-600));
    assert_eq!(status.exposure, Decimal::ZERO);
    assert_eq!(status.last_reset, Some(trading_day()));
    assert!(!status.trading_allowed);

    let result = restarted.can_open_position(&request(), later).await;
    assert_eq!(
        result,
        RiskCheckResult::Rejected(RiskError::ConsecutiveLosses { count: 2, limit: 2 })
    );
}

#[tokio::test]
async fn restart_keeps_open_position_exposure() {
    let db = TempDb::create();
    let risk = manager(db.store(), &RecordingNotifier::new());
    assert!(risk.can_open_position(&request(), market_hours()).await.is_approved());
    let mut position = open_position(dec!(200), 20, market_hours());
    risk.record_position_opened(&mut position).unwrap();

    let restarted = manager(db.reopen(), &RecordingNotifier::new());
    restarted.restore(market_hours() + Duration::minutes(3)).unwrap();

    let status = restarted.risk_status(market_hours());
    assert_eq!(status.trades_today, 1);
    assert_eq!(status.exposure, dec!(4000));
    let open = restarted.state().open_position().expect("open position restored");
    assert_eq!(open.id, position.id);
}

#[tokio::test]
async fn next_trading_day_starts_clean() {
    let db = TempDb::create();
    let events = RecordingNotifier::new();
    let risk = manager(db.store(), &events);
    round_trip(&risk, market_hours(), dec!(190)).await;
    round_trip(&risk, market_hours() + Duration::minutes(30), dec!(180)).await;
    assert!(risk.state().is_halted());

    let tuesday = date(2025, 1, 7);
    assert!(!risk.check_daily_reset(ist(tuesday, 9, 0)));
    assert!(risk.check_daily_reset(ist(tuesday, 9, 20)));
    assert!(!risk.state().is_halted());
    let result = risk.can_open_position(&request(), ist(tuesday, 9, 30)).await;
    assert!(result.is_approved());
    assert_eq!(db.store().last_risk_reset().unwrap(), Some(tuesday));
    assert_eq!(events.count(|e| matches!(e, Event::TradingResumed)), 1);

    let status = risk.risk_status(ist(tuesday, 9, 30));
    assert_eq!(status.trades_today, 0);
    assert_eq!(status.daily_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn violations_land_in_the_daily_report() {
    let db = TempDb::create();
    let risk = manager(db.store(), &RecordingNotifier::new());
    round_trip(&risk, market_hours(), dec!(190)).await;
    round_trip(&risk, market_hours() + Duration::minutes(30), dec!(230)).await;
    round_trip(&risk, market_hours() + Duration::minutes(60), dec!(210)).await;

    let fourth = risk
        .can_open_position(&request(), market_hours() + Duration::minutes(90))
        .await;
    assert_eq!(
        fourth,
        RiskCheckResult::Rejected(RiskError::MaxDailyTrades { count: 3, limit: 3 })
    );

    let report = risk.daily_report(trading_day()).unwrap();
    assert_eq!(report.total_trades, 3);
    assert_eq!(report.closed_trades, 3);
    assert_eq!(report.wins, 2);
    assert_eq!(report.losses, 1);
    assert_eq!(report.total_pnl, dec!(600));
    assert_eq!(report.violations.len(), 1);
    assert!(report.violations[0].contains("trades/day"));
    assert_eq!(report.compliance.score(), 3);
}

#[tokio::test]
async fn closed_market_is_rejected_before_balance() {
    let db = TempDb::create();
    let risk = manager(db.store(), &RecordingNotifier::new());
    let evening = ist(trading_day(), 16, 0);
    let huge = RiskRequest {
        quantity: 400,
        ..request()
    };
    // 80_000 fits the exposure cap but not the virtual balance with buffer.
    let result = risk.can_open_position(&huge, evening).await;
    assert_eq!(result, RiskCheckResult::Rejected(RiskError::MarketClosed));

    let alerts = db.store().alerts_for_date(trading_day(), Some("RISK_VIOLATION")).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metadata["code"], "market_closed");
}
