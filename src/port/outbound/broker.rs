//! Broker port: market data, orders and session exchange.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::money::{Price, Quantity};
use crate::domain::Candle;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
        }
    }
}

/// A single order for the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub exchange: String,
    pub tradingsymbol: String,
    pub transaction_type: TransactionType,
    pub quantity: Quantity,
    pub order_type: OrderType,
    /// Product code, `MIS` for intraday.
    pub product: String,
    /// Limit price, or the reference price for simulated fills.
    pub price: Option<Price>,
    pub tag: Option<String>,
}

impl OrderRequest {
    /// Intraday market order.
    #[must_use]
    pub fn market(
        exchange: &str,
        tradingsymbol: &str,
        transaction_type: TransactionType,
        quantity: Quantity,
        reference_price: Price,
    ) -> Self {
        Self {
            exchange: exchange.to_string(),
            tradingsymbol: tradingsymbol.to_string(),
            transaction_type,
            quantity,
            order_type: OrderType::Market,
            product: "MIS".to_string(),
            price: Some(reference_price),
            tag: None,
        }
    }
}

/// Broker acknowledgement of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    /// Fill price when known at placement time (simulated fills).
    pub fill_price: Option<Price>,
}

/// Instrument master entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: u64,
    pub exchange: String,
    pub tradingsymbol: String,
    pub name: String,
    pub strike: f64,
    pub expiry: Option<NaiveDate>,
    pub lot_size: u32,
    pub instrument_type: String,
}

/// Candle width accepted by the historical API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleInterval {
    Minute,
    ThreeMinute,
    FiveMinute,
    FifteenMinute,
    Day,
}

impl CandleInterval {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::ThreeMinute => "3minute",
            Self::FiveMinute => "5minute",
            Self::FifteenMinute => "15minute",
            Self::Day => "day",
        }
    }

    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::ThreeMinute => 180,
            Self::FiveMinute => 300,
            Self::FifteenMinute => 900,
            Self::Day => 86_400,
        }
    }
}

/// Market data and order routing.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Cash available for new positions.
    async fn available_balance(&self) -> Result<Price>;

    /// Last traded price for `EXCHANGE:SYMBOL`.
    async fn ltp(&self, instrument: &str) -> Result<Price>;

    /// Candles for `token` over `[from, to]`, oldest first.
    async fn historical(
        &self,
        token: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>>;

    async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;
}

/// Access token obtained from a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub access_token: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub login_time: Option<String>,
}

/// Trades a one-time request token for an access token.
#[async_trait]
pub trait SessionExchanger: Send + Sync {
    async fn exchange(&self, request_token: &str) -> Result<SessionGrant>;
}
