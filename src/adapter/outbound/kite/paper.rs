//! Simulated execution for test and paper modes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::info;

use crate::domain::calendar::MarketCalendar;
use crate::domain::money::{price_from_f64, Price};
use crate::domain::{Candle, INDEX_EXCHANGE, INDEX_SYMBOL, SENSEX_TOKEN};
use crate::error::{BrokerError, Error, Result};
use crate::port::outbound::broker::{
    Broker, CandleInterval, Instrument, OrderAck, OrderRequest,
};

const SYNTHETIC_TOKEN_BASE: u64 = 1_000_000;

/// Deterministic 09:15-15:30 IST bars for `token` over `[from, to]`.
///
/// The same inputs always yield the same candles. The index token trades
/// around 75 000, everything else around a few hundred rupees of premium.
#[must_use]
pub fn synthetic_candles(
    token: u64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: CandleInterval,
) -> Vec<Candle> {
    let calendar = MarketCalendar::default();
    let step = interval.seconds();
    let base = if token == SENSEX_TOKEN {
        75_000.0
    } else {
        150.0 + (token % 100) as f64
    };
    let phase = (token % 97) as f64;
    let level = |bar: i64| {
        let x = bar as f64;
        base * (1.0 + 0.002 * (x / 7.0 + phase).sin() + 0.001 * (x / 3.0).sin())
    };

    let first = from.timestamp().div_euclid(step) + i64::from(from.timestamp().rem_euclid(step) != 0);
    let last = to.timestamp().div_euclid(step);
    (first..=last)
        .filter_map(|bar| {
            let timestamp = Utc.timestamp_opt(bar * step, 0).single()?;
            if !calendar.is_market_open(timestamp) {
                return None;
            }
            let open = level(bar - 1);
            let close = level(bar);
            Some(Candle {
                timestamp,
                open,
                high: open.max(close) + base * 0.0005,
                low: open.min(close) - base * 0.0005,
                close,
                volume: 1_000.0 + (bar.rem_euclid(10) * 100) as f64,
            })
        })
        .collect()
}

fn synthetic_token(tradingsymbol: &str) -> u64 {
    let hash = tradingsymbol
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    SYNTHETIC_TOKEN_BASE + hash % SYNTHETIC_TOKEN_BASE
}

/// [`Broker`] that fills every order at its reference price.
///
/// With a data broker (paper mode) quotes and candles come from Kite.
/// Without one (test mode) they are synthetic. The balance is always the
/// configured virtual balance.
pub struct PaperBroker {
    data: Option<Arc<dyn Broker>>,
    virtual_balance: Price,
    next_order: AtomicU64,
}

impl PaperBroker {
    pub fn new(data: Option<Arc<dyn Broker>>, virtual_balance: Price) -> Self {
        Self {
            data,
            virtual_balance,
            next_order: AtomicU64::new(1),
        }
    }

    /// Test mode: no network at all.
    pub fn synthetic(virtual_balance: Price) -> Self {
        Self::new(None, virtual_balance)
    }

    fn last_synthetic_close(token: u64) -> Option<Price> {
        let now = Utc::now();
        synthetic_candles(token, now - Duration::days(7), now, CandleInterval::ThreeMinute)
            .last()
            .map(|c| price_from_f64(c.close))
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn available_balance(&self) -> Result<Price> {
        Ok(self.virtual_balance)
    }

    async fn ltp(&self, instrument: &str) -> Result<Price> {
        if let Some(data) = &self.data {
            return data.ltp(instrument).await;
        }
        let symbol = instrument.split_once(':').map_or(instrument, |(_, s)| s);
        let token = if symbol == INDEX_SYMBOL {
            SENSEX_TOKEN
        } else {
            synthetic_token(symbol)
        };
        Self::last_synthetic_close(token)
            .ok_or_else(|| Error::Broker(BrokerError::InstrumentNotFound(instrument.to_string())))
    }

    async fn historical(
        &self,
        token: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        match &self.data {
            Some(data) => data.historical(token, from, to, interval).await,
            None => Ok(synthetic_candles(token, from, to, interval)),
        }
    }

    async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument> {
        if let Some(data) = &self.data {
            return data.find_instrument(exchange, tradingsymbol).await;
        }
        let (token, instrument_type) = if exchange == INDEX_EXCHANGE && tradingsymbol == INDEX_SYMBOL {
            (SENSEX_TOKEN, "EQ")
        } else {
            let kind = if tradingsymbol.ends_with("PE") { "PE" } else { "CE" };
            (synthetic_token(tradingsymbol), kind)
        };
        Ok(Instrument {
            instrument_token: token,
            exchange: exchange.to_string(),
            tradingsymbol: tradingsymbol.to_string(),
            name: INDEX_SYMBOL.to_string(),
            strike: 0.0,
            expiry: None,
            lot_size: 20,
            instrument_type: instrument_type.to_string(),
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let fill = match order.price {
            Some(price) => price,
            None => {
                self.ltp(&format!("{}:{}", order.exchange, order.tradingsymbol))
                    .await?
            }
        };
        let order_id = format!("PAPER-{}", self.next_order.fetch_add(1, Ordering::SeqCst));
        info!(
            order_id = %order_id,
            symbol = %order.tradingsymbol,
            side = order.transaction_type.as_str(),
            qty = order.quantity,
            price = %fill,
            "Paper order filled"
        );
        Ok(OrderAck {
            order_id,
            fill_price: Some(fill),
        })
    }
}
