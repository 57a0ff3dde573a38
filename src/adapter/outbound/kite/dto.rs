//! Kite Connect wire types.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::port::outbound::broker::Instrument;

/// Every JSON response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Margins {
    pub equity: Option<SegmentMargin>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SegmentMargin {
    pub available: AvailableMargin,
}

#[derive(Debug, Deserialize)]
pub(super) struct AvailableMargin {
    pub live_balance: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct LtpQuote {
    pub last_price: f64,
}

pub(super) type LtpData = HashMap<String, LtpQuote>;

/// `[timestamp, open, high, low, close, volume]` rows.
#[derive(Debug, Deserialize)]
pub(super) struct HistoricalData {
    pub candles: Vec<(String, f64, f64, f64, f64, f64)>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderData {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionData {
    pub access_token: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub login_time: Option<String>,
}

/// One line of the `/instruments/{exchange}` CSV dump.
#[derive(Debug, Deserialize)]
pub(super) struct InstrumentRecord {
    pub instrument_token: u64,
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "optional_date")]
    pub expiry: Option<NaiveDate>,
    #[serde(default)]
    pub strike: f64,
    #[serde(default)]
    pub lot_size: u32,
    #[serde(default)]
    pub instrument_type: String,
    pub exchange: String,
}

impl From<InstrumentRecord> for Instrument {
    fn from(r: InstrumentRecord) -> Self {
        Self {
            instrument_token: r.instrument_token,
            exchange: r.exchange,
            tradingsymbol: r.tradingsymbol,
            name: r.name,
            strike: r.strike,
            expiry: r.expiry,
            lot_size: r.lot_size,
            instrument_type: r.instrument_type,
        }
    }
}

fn optional_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
}
