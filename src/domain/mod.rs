//! Broker-agnostic domain logic for the SENSEX options strategy.
//!
//! Everything here is plain data and arithmetic with no I/O. Time-dependent
//! rules take the instant to evaluate as an argument.

pub mod auth;
pub mod calendar;
pub mod candle;
pub mod error;
pub mod instrument;
pub mod mode;
pub mod money;
pub mod position;
pub mod session;
pub mod signal;

pub use auth::{mask_secret, AuthStatus, PendingAuth};
pub use calendar::{ist, now_ist, MarketCalendar};
pub use candle::{ema, Candle, CandleSeries, EmaSnapshot};
pub use instrument::{
    option_symbol, select_strike, strike_ladder, weekly_expiry, StrikeSlot, INDEX_EXCHANGE,
    INDEX_SYMBOL, OPTIONS_EXCHANGE, SENSEX_TOKEN,
};
pub use mode::TradingMode;
pub use money::{Price, Quantity};
pub use position::{NewPosition, Position, PositionStatus};
pub use session::TradingSession;
pub use signal::{ExitReason, OptionType, SignalCondition, SignalSource, SignalType, TradingSignal};
