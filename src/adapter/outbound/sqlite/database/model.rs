//! Diesel row types.
//!
//! Timestamps are RFC 3339 text in UTC, dates are `YYYY-MM-DD`, and prices
//! are REAL.

use diesel::prelude::*;

use super::schema::{positions, risk_state, system_alerts, trading_sessions};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = positions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PositionRow {
    pub id: i64,
    pub symbol: String,
    pub option_type: String,
    pub strike: i32,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: i32,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub exit_reason: Option<String>,
    pub pnl: Option<f64>,
    pub status: String,
    pub trade_date: String,
    pub metadata: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = positions)]
pub struct NewPositionRow {
    pub symbol: String,
    pub option_type: String,
    pub strike: i32,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: i32,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub exit_reason: Option<String>,
    pub pnl: Option<f64>,
    pub status: String,
    pub trade_date: String,
    pub metadata: Option<String>,
}

/// Mutable columns of a position.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = positions)]
#[diesel(treat_none_as_null = true)]
pub struct PositionChanges {
    pub quantity: i32,
    pub exit_price: Option<f64>,
    pub exit_time: Option<String>,
    pub exit_reason: Option<String>,
    pub pnl: Option<f64>,
    pub status: String,
    pub metadata: Option<String>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = trading_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRow {
    pub id: i64,
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub sensex_entry_price: Option<f64>,
    pub positions_opened: i32,
    pub positions_closed: i32,
    pub total_pnl: f64,
    pub total_signals: i32,
    pub metadata: Option<String>,
}

/// Insert and upsert payload for a session.
#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = trading_sessions)]
#[diesel(treat_none_as_null = true)]
pub struct SessionUpsert {
    pub date: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub sensex_entry_price: Option<f64>,
    pub positions_opened: i32,
    pub positions_closed: i32,
    pub total_pnl: f64,
    pub total_signals: i32,
    pub metadata: Option<String>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = system_alerts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AlertRow {
    pub id: i64,
    pub timestamp: String,
    pub alert_type: String,
    pub message: String,
    pub metadata: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = system_alerts)]
pub struct NewAlertRow {
    pub timestamp: String,
    pub alert_type: String,
    pub message: String,
    pub metadata: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = risk_state)]
pub struct RiskStateRow {
    pub id: i32,
    pub last_reset_date: Option<String>,
}
