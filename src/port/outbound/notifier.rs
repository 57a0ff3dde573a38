//! Notifier port for event notifications.
//!
//! Defines the events the bot reports (signals, fills, risk decisions,
//! logins) and the trait that delivers them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::money::{Price, Quantity};
use crate::domain::{ExitReason, OptionType, Position, TradingMode, TradingSignal};
use crate::error::RiskError;

/// Events that can trigger notifications.
#[derive(Debug, Clone)]
pub enum Event {
    /// Detector produced an actionable signal.
    SignalDetected(SignalEvent),
    PositionOpened(OpenedEvent),
    PositionClosed(ClosedEvent),
    /// Risk check rejected an entry.
    RiskRejected(RiskEvent),
    TradingHalted {
        reason: String,
    },
    TradingResumed,
    /// A login link was issued.
    AuthLoginRequested(LoginEvent),
    AuthCompleted(AuthEvent),
    AuthFailed {
        state: String,
        reason: String,
    },
    DailyReport(ReportEvent),
    /// End-of-day candles were archived.
    DataCollected(CollectionEvent),
    SystemError {
        context: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub symbol: Option<String>,
    pub option_type: Option<OptionType>,
    pub strike: Option<u32>,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
}

impl From<&TradingSignal> for SignalEvent {
    fn from(signal: &TradingSignal) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            option_type: signal.option_type,
            strike: signal.strike,
            confidence: signal.confidence,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenedEvent {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: u32,
    pub quantity: Quantity,
    pub entry_price: Price,
    pub stop_loss: Price,
    pub mode: TradingMode,
    /// 1-based number of this trade today.
    pub trade_number: u32,
    pub remaining_trades: u32,
}

impl OpenedEvent {
    #[must_use]
    pub fn new(
        position: &Position,
        mode: TradingMode,
        trade_number: u32,
        remaining_trades: u32,
    ) -> Self {
        Self {
            symbol: position.symbol.clone(),
            option_type: position.option_type,
            strike: position.strike,
            quantity: position.quantity,
            entry_price: position.entry_price,
            stop_loss: position.stop_loss,
            mode,
            trade_number,
            remaining_trades,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClosedEvent {
    pub symbol: String,
    pub quantity: Quantity,
    pub entry_price: Price,
    pub exit_price: Price,
    pub pnl: Price,
    pub reason: ExitReason,
    pub daily_pnl: Price,
    pub consecutive_losses: u32,
}

/// Risk rejection event.
#[derive(Debug, Clone)]
pub struct RiskEvent {
    pub symbol: String,
    pub code: &'static str,
    pub reason: String,
}

impl RiskEvent {
    #[must_use]
    pub fn new(symbol: &str, error: &RiskError) -> Self {
        Self {
            symbol: symbol.to_string(),
            code: error.code(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginEvent {
    pub state: String,
    pub login_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub user_id: String,
    pub mode: TradingMode,
    /// Masked token, never the full value.
    pub token_preview: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReportEvent {
    pub date: NaiveDate,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone)]
pub struct CollectionEvent {
    pub date: NaiveDate,
    /// Series written, index included.
    pub files: usize,
    pub expected: usize,
    pub atm_strike: u32,
    pub sensex_open: Option<f64>,
    pub sensex_close: Option<f64>,
}

/// Trait for notification handlers.
///
/// `notify` must return quickly; slow delivery (HTTP) belongs on a
/// background task owned by the implementation.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);
}

/// Registry of notifiers (composite pattern).
///
/// Broadcasts events to all registered notifiers.
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { notifiers: vec![] }
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn notify_all(&self, event: Event) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A no-op notifier for tests or when notifications are disabled.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: Event) {}
}

/// A logging notifier that logs events via tracing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        use tracing::{info, warn};
        match event {
            Event::SignalDetected(e) => {
                info!(
                    symbol = ?e.symbol,
                    confidence = e.confidence,
                    entry = e.entry_price,
                    "Signal detected"
                );
            }
            Event::PositionOpened(e) => {
                info!(
                    symbol = %e.symbol,
                    qty = e.quantity,
                    entry = %e.entry_price,
                    trade = e.trade_number,
                    remaining = e.remaining_trades,
                    "Position opened"
                );
            }
            Event::PositionClosed(e) => {
                info!(
                    symbol = %e.symbol,
                    exit = %e.exit_price,
                    pnl = %e.pnl,
                    reason = %e.reason,
                    "Position closed"
                );
            }
            Event::RiskRejected(e) => {
                info!(symbol = %e.symbol, code = e.code, reason = %e.reason, "Risk rejected");
            }
            Event::TradingHalted { reason } => {
                warn!(reason = %reason, "Trading halted");
            }
            Event::TradingResumed => {
                info!("Trading resumed");
            }
            Event::AuthLoginRequested(e) => {
                info!(state = %e.state, expires_at = %e.expires_at, "Login requested");
            }
            Event::AuthCompleted(e) => {
                info!(user_id = %e.user_id, token = %e.token_preview, "Authentication completed");
            }
            Event::AuthFailed { state, reason } => {
                warn!(state = %state, reason = %reason, "Authentication failed");
            }
            Event::DailyReport(e) => {
                info!(
                    date = %e.date,
                    trades = e.total_trades,
                    wins = e.wins,
                    losses = e.losses,
                    pnl = %e.total_pnl,
                    "Daily report"
                );
            }
            Event::DataCollected(e) => {
                info!(
                    date = %e.date,
                    files = e.files,
                    expected = e.expected,
                    atm = e.atm_strike,
                    "Market data collected"
                );
            }
            Event::SystemError { context, message } => {
                warn!(context = %context, error = %message, "System error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    impl Notifier for Counting {
        fn notify(&self, _event: Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn registry_broadcasts_to_every_notifier() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(Counting(hits.clone())));
        registry.register(Box::new(Counting(hits.clone())));
        registry.register(Box::new(NullNotifier));

        registry.notify_all(Event::TradingResumed);

        assert_eq!(registry.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn risk_event_carries_code() {
        let event = RiskEvent::new("SENSEX", &RiskError::MarketClosed);
        assert_eq!(event.code, "market_closed");
    }
}
