//! Scripted broker for deterministic tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::money::Price;
use crate::domain::Candle;
use crate::error::{BrokerError, Error, Result};
use crate::port::outbound::broker::{
    Broker, CandleInterval, Instrument, OrderAck, OrderRequest,
};

/// [`Broker`] that serves canned data and records every order.
#[derive(Default)]
pub struct ScriptedBroker {
    balance: Mutex<Option<Price>>,
    prices: Mutex<HashMap<String, Price>>,
    candles: Mutex<HashMap<u64, Vec<Candle>>>,
    instruments: Mutex<Vec<Instrument>>,
    orders: Mutex<Vec<OrderRequest>>,
    reject_orders: Mutex<Option<String>>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance returned by [`Broker::available_balance`]; `None` fails the call.
    pub fn set_balance(&self, balance: Option<Price>) {
        *self.balance.lock() = balance;
    }

    pub fn set_price(&self, instrument: &str, price: Price) {
        self.prices.lock().insert(instrument.to_string(), price);
    }

    pub fn set_candles(&self, token: u64, candles: Vec<Candle>) {
        self.candles.lock().insert(token, candles);
    }

    pub fn add_instrument(&self, instrument: Instrument) {
        self.instruments.lock().push(instrument);
    }

    /// Reject every subsequent order with `reason`.
    pub fn reject_orders(&self, reason: Option<&str>) {
        *self.reject_orders.lock() = reason.map(str::to_string);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn available_balance(&self) -> Result<Price> {
        (*self.balance.lock()).ok_or_else(|| {
            Error::Broker(BrokerError::Api {
                error_type: "NetworkException".into(),
                message: "balance unavailable".into(),
            })
        })
    }

    async fn ltp(&self, instrument: &str) -> Result<Price> {
        self.prices
            .lock()
            .get(instrument)
            .copied()
            .ok_or_else(|| Error::Broker(BrokerError::InstrumentNotFound(instrument.into())))
    }

    async fn historical(
        &self,
        token: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        Ok(self
            .candles
            .lock()
            .get(&token)
            .map(|c| {
                c.iter()
                    .filter(|c| c.timestamp >= from && c.timestamp <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument> {
        self.instruments
            .lock()
            .iter()
            .find(|i| i.exchange == exchange && i.tradingsymbol == tradingsymbol)
            .cloned()
            .ok_or_else(|| Error::Broker(BrokerError::InstrumentNotFound(tradingsymbol.into())))
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        if let Some(reason) = self.reject_orders.lock().clone() {
            return Err(Error::Broker(BrokerError::OrderRejected(reason)));
        }
        let mut orders = self.orders.lock();
        orders.push(order.clone());
        Ok(OrderAck {
            order_id: format!("ORD{}", orders.len()),
            fill_price: order.price,
        })
    }
}
