//! A full simulated trading day against SQLite.

mod harness;

use std::sync::Arc;

use chrono::Duration;
use harness::recording_notifier::RecordingNotifier;
use harness::temp_db::TempDb;
use sensexbot::adapter::outbound::kite::PaperBroker;
use sensexbot::application::risk::{BalanceSource, RiskManager};
use sensexbot::application::state::{AppState, RiskLimits};
use sensexbot::application::trading::{CycleOutcome, EngineSettings, TradingEngine};
use sensexbot::domain::{MarketCalendar, PositionStatus, TradingMode};
use sensexbot::port::outbound::notifier::Event;
use sensexbot::port::outbound::store::TradeStore;
use sensexbot::testkit::domain::{ist, trading_day};

struct Day {
    engine: TradingEngine,
    state: Arc<AppState>,
    events: RecordingNotifier,
}

fn simulated_day(db: &TempDb) -> Day {
    let limits = RiskLimits::default();
    let state = Arc::new(AppState::new(TradingMode::Test, limits.clone()));
    let events = RecordingNotifier::new();
    let notifier = events.registry();
    let broker = Arc::new(PaperBroker::synthetic(limits.virtual_balance));
    let risk = Arc::new(RiskManager::new(
        Arc::clone(&state),
        db.store(),
        Arc::clone(&notifier),
        MarketCalendar::default(),
        Arc::new(BalanceSource::new(
            TradingMode::Test,
            None,
            limits.virtual_balance,
            limits.emergency_balance,
        )),
    ));
    let engine = TradingEngine::new(broker, risk, db.store(), notifier, EngineSettings::default());
    Day {
        engine,
        state,
        events,
    }
}

#[tokio::test]
async fn synthetic_day_respects_limits_and_closes_flat() {
    let db = TempDb::create();
    let mut day = simulated_day(&db);

    let mut at = ist(trading_day(), 9, 15);
    let close = ist(trading_day(), 15, 30);
    let mut end_of_day = 0;
    while at <= close {
        let outcome = day.engine.run_cycle(at).await.unwrap();
        if matches!(outcome, CycleOutcome::EndOfDay { .. }) {
            end_of_day += 1;
        }
        at += Duration::minutes(3);
    }

    assert_eq!(end_of_day, 1);
    assert!(day.state.open_position().is_none());

    let store = db.reopen();
    let positions = store.positions_for_date(trading_day()).unwrap();
    assert!(positions.len() <= RiskLimits::default().max_daily_trades as usize);
    assert!(positions.iter().all(|p| p.status == PositionStatus::Closed));
    assert!(store.open_positions().unwrap().is_empty());

    let session = store.session_for_date(trading_day()).unwrap().unwrap();
    assert!(session.is_finished());
    assert!(session.errors.is_empty());
    assert_eq!(session.positions_opened as usize, positions.len());
    assert_eq!(session.positions_closed, session.positions_opened);
    assert!(session.sensex_entry_price.is_some());

    assert_eq!(
        day.events.count(|e| matches!(e, Event::DailyReport(_))),
        1
    );
    assert_eq!(
        day.events.count(|e| matches!(e, Event::PositionOpened(_))),
        positions.len()
    );
}

#[tokio::test]
async fn cycles_before_the_entry_window_do_nothing() {
    let db = TempDb::create();
    let mut day = simulated_day(&db);

    let outcome = day.engine.run_cycle(ist(trading_day(), 9, 15)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped);
    assert!(day.engine.session().is_none());
    assert!(db.store().session_for_date(trading_day()).unwrap().is_none());
    assert_eq!(day.events.len(), 0);
}

#[tokio::test]
async fn restarted_engine_does_not_close_the_day_twice() {
    let db = TempDb::create();
    let mut day = simulated_day(&db);
    let after_close = ist(trading_day(), 15, 20);
    let outcome = day.engine.run_cycle(after_close).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::EndOfDay { closed: None }));

    let mut restarted = simulated_day(&db);
    let outcome = restarted
        .engine
        .run_cycle(after_close + Duration::minutes(3))
        .await
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped);
    assert_eq!(
        restarted.events.count(|e| matches!(e, Event::DailyReport(_))),
        0
    );
}
