//! SQLite trade store.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adapter::outbound::sqlite::database::connection::{
    create_pool, run_migrations, DbConnection, DbPool,
};
use crate::adapter::outbound::sqlite::database::model::{
    AlertRow, NewAlertRow, NewPositionRow, PositionChanges, PositionRow, RiskStateRow,
    SessionRow, SessionUpsert,
};
use crate::adapter::outbound::sqlite::database::schema::{
    positions, risk_state, system_alerts, trading_sessions,
};
use crate::domain::calendar::ist_instant;
use crate::domain::money::{price_from_f64, price_to_f64};
use crate::domain::{Position, PositionStatus, TradingSession};
use crate::error::{Error, Result};
use crate::port::outbound::store::{AlertRecord, TradeStore};

const DATE_FORMAT: &str = "%Y-%m-%d";
const RISK_STATE_ID: i32 = 1;

/// Position fields with no dedicated column.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PositionMeta {
    entry_basis: f64,
    stop_loss: f64,
    #[serde(default)]
    candle_count: u32,
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionMeta {
    #[serde(default)]
    errors: Vec<String>,
}

/// [`TradeStore`] over a Diesel SQLite pool.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open `database_url`, creating the schema if needed.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or migrated.
    pub fn open(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url)?;
        run_migrations(&pool)?;
        Ok(Self::new(pool))
    }

    fn conn(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("timestamp {raw}: {e}")))
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| Error::Parse(format!("date {raw}: {e}")))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn position_meta(position: &Position) -> Result<String> {
    let meta = PositionMeta {
        entry_basis: price_to_f64(position.entry_basis),
        stop_loss: price_to_f64(position.stop_loss),
        candle_count: position.candle_count,
        order_id: position.order_id.clone(),
    };
    Ok(serde_json::to_string(&meta)?)
}

fn position_changes(position: &Position) -> Result<PositionChanges> {
    Ok(PositionChanges {
        quantity: to_i32(position.quantity),
        exit_price: position.exit_price.map(price_to_f64),
        exit_time: position.exit_time.map(timestamp),
        exit_reason: position.exit_reason.map(|r| r.as_str().to_string()),
        pnl: position.pnl.map(price_to_f64),
        status: position.status.as_str().to_string(),
        metadata: Some(position_meta(position)?),
    })
}

fn position_from_row(row: PositionRow) -> Result<Position> {
    let meta: PositionMeta = match row.metadata.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => PositionMeta::default(),
    };
    Ok(Position {
        id: Some(row.id),
        option_type: row.option_type.parse().map_err(Error::Domain)?,
        symbol: row.symbol,
        strike: to_u32(row.strike),
        entry_price: price_from_f64(row.entry_price),
        entry_time: parse_timestamp(&row.entry_time)?,
        entry_basis: price_from_f64(meta.entry_basis),
        stop_loss: price_from_f64(meta.stop_loss),
        quantity: to_u32(row.quantity),
        status: row.status.parse::<PositionStatus>().map_err(Error::Domain)?,
        exit_price: row.exit_price.map(price_from_f64),
        exit_time: row.exit_time.as_deref().map(parse_timestamp).transpose()?,
        exit_reason: row
            .exit_reason
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(Error::Domain)?,
        candle_count: meta.candle_count,
        pnl: row.pnl.map(price_from_f64),
        order_id: meta.order_id,
    })
}

fn session_upsert(session: &TradingSession) -> Result<SessionUpsert> {
    let meta = SessionMeta {
        errors: session.errors.clone(),
    };
    Ok(SessionUpsert {
        date: date_text(session.date),
        start_time: timestamp(session.start_time),
        end_time: session.end_time.map(timestamp),
        sensex_entry_price: session.sensex_entry_price.map(price_to_f64),
        positions_opened: to_i32(session.positions_opened),
        positions_closed: to_i32(session.positions_closed),
        total_pnl: price_to_f64(session.total_pnl),
        total_signals: to_i32(session.total_signals),
        metadata: Some(serde_json::to_string(&meta)?),
    })
}

fn session_from_row(row: SessionRow) -> Result<TradingSession> {
    let meta: SessionMeta = match row.metadata.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => SessionMeta::default(),
    };
    Ok(TradingSession {
        date: parse_date(&row.date)?,
        start_time: parse_timestamp(&row.start_time)?,
        end_time: row.end_time.as_deref().map(parse_timestamp).transpose()?,
        sensex_entry_price: row.sensex_entry_price.map(price_from_f64),
        total_signals: to_u32(row.total_signals),
        positions_opened: to_u32(row.positions_opened),
        positions_closed: to_u32(row.positions_closed),
        total_pnl: price_from_f64(row.total_pnl),
        errors: meta.errors,
    })
}

fn alert_from_row(row: AlertRow) -> Result<AlertRecord> {
    let metadata = match row.metadata.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Null,
    };
    Ok(AlertRecord {
        id: Some(row.id),
        timestamp: parse_timestamp(&row.timestamp)?,
        alert_type: row.alert_type,
        message: row.message,
        metadata,
    })
}

impl TradeStore for SqliteStore {
    fn save_position(&self, position: &Position, trade_date: NaiveDate) -> Result<i64> {
        let row = NewPositionRow {
            symbol: position.symbol.clone(),
            option_type: position.option_type.as_str().to_string(),
            strike: to_i32(position.strike),
            entry_price: price_to_f64(position.entry_price),
            exit_price: position.exit_price.map(price_to_f64),
            quantity: to_i32(position.quantity),
            entry_time: timestamp(position.entry_time),
            exit_time: position.exit_time.map(timestamp),
            exit_reason: position.exit_reason.map(|r| r.as_str().to_string()),
            pnl: position.pnl.map(price_to_f64),
            status: position.status.as_str().to_string(),
            trade_date: date_text(trade_date),
            metadata: Some(position_meta(position)?),
        };
        let mut conn = self.conn()?;
        let id = conn.transaction(|conn| {
            diesel::insert_into(positions::table)
                .values(&row)
                .execute(conn)?;
            positions::table
                .select(positions::id)
                .order(positions::id.desc())
                .first::<i64>(conn)
        })?;
        Ok(id)
    }

    fn update_position(&self, position: &Position) -> Result<()> {
        let id = position
            .id
            .ok_or_else(|| Error::Database("position has no id".to_string()))?;
        let changes = position_changes(position)?;
        let mut conn = self.conn()?;
        let updated = diesel::update(positions::table.find(id))
            .set(&changes)
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(Error::Database(format!("position {id} not found")));
        }
        Ok(())
    }

    fn positions_for_date(&self, date: NaiveDate) -> Result<Vec<Position>> {
        let mut conn = self.conn()?;
        let rows: Vec<PositionRow> = positions::table
            .filter(positions::trade_date.eq(date_text(date)))
            .order(positions::id.asc())
            .select(PositionRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(position_from_row).collect()
    }

    fn open_positions(&self) -> Result<Vec<Position>> {
        let mut conn = self.conn()?;
        let rows: Vec<PositionRow> = positions::table
            .filter(positions::status.eq(PositionStatus::Open.as_str()))
            .order(positions::id.asc())
            .select(PositionRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(position_from_row).collect()
    }

    fn save_session(&self, session: &TradingSession) -> Result<()> {
        let row = session_upsert(session)?;
        let mut conn = self.conn()?;
        diesel::insert_into(trading_sessions::table)
            .values(&row)
            .on_conflict(trading_sessions::date)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn session_for_date(&self, date: NaiveDate) -> Result<Option<TradingSession>> {
        let mut conn = self.conn()?;
        let row: Option<SessionRow> = trading_sessions::table
            .filter(trading_sessions::date.eq(date_text(date)))
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(session_from_row).transpose()
    }

    fn save_alert(&self, alert: &AlertRecord) -> Result<i64> {
        let metadata = if alert.metadata.is_null() {
            None
        } else {
            Some(serde_json::to_string(&alert.metadata)?)
        };
        let row = NewAlertRow {
            timestamp: timestamp(alert.timestamp),
            alert_type: alert.alert_type.clone(),
            message: alert.message.clone(),
            metadata,
        };
        let mut conn = self.conn()?;
        let id = conn.transaction(|conn| {
            diesel::insert_into(system_alerts::table)
                .values(&row)
                .execute(conn)?;
            system_alerts::table
                .select(system_alerts::id)
                .order(system_alerts::id.desc())
                .first::<i64>(conn)
        })?;
        Ok(id)
    }

    fn alerts_for_date(
        &self,
        date: NaiveDate,
        alert_type: Option<&str>,
    ) -> Result<Vec<AlertRecord>> {
        let start = timestamp(ist_instant(date, 0));
        let end = timestamp(ist_instant(date + Duration::days(1), 0));
        let mut query = system_alerts::table
            .filter(system_alerts::timestamp.ge(start))
            .filter(system_alerts::timestamp.lt(end))
            .into_boxed();
        if let Some(kind) = alert_type {
            query = query.filter(system_alerts::alert_type.eq(kind.to_string()));
        }
        let mut conn = self.conn()?;
        let rows: Vec<AlertRow> = query
            .order(system_alerts::id.asc())
            .select(AlertRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(alert_from_row).collect()
    }

    fn last_risk_reset(&self) -> Result<Option<NaiveDate>> {
        let mut conn = self.conn()?;
        let value: Option<Option<String>> = risk_state::table
            .find(RISK_STATE_ID)
            .select(risk_state::last_reset_date)
            .first(&mut conn)
            .optional()?;
        value.flatten().as_deref().map(parse_date).transpose()
    }

    fn set_last_risk_reset(&self, date: NaiveDate) -> Result<()> {
        let text = date_text(date);
        let row = RiskStateRow {
            id: RISK_STATE_ID,
            last_reset_date: Some(text.clone()),
        };
        let mut conn = self.conn()?;
        diesel::insert_into(risk_state::table)
            .values(&row)
            .on_conflict(risk_state::id)
            .do_update()
            .set(risk_state::last_reset_date.eq(Some(text)))
            .execute(&mut conn)?;
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitReason;
    use crate::port::outbound::store::AlertKind;
    use crate::testkit::domain::{ist, market_hours, open_position, trading_day};
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    #[test]
    fn position_lifecycle() {
        let store = store();
        let mut position = open_position(dec!(214.5), 20, market_hours());
        position.order_id = Some("ORD1".into());
        position.candle_count = 3;

        let id = store.save_position(&position, trading_day()).unwrap();
        position.id = Some(id);
        assert_eq!(store.open_positions().unwrap(), vec![position.clone()]);

        position.close(dec!(230.25), ExitReason::ProfitTarget, ist(trading_day(), 11, 0));
        store.update_position(&position).unwrap();

        let saved = store.positions_for_date(trading_day()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, PositionStatus::Closed);
        assert_eq!(saved[0].pnl, Some(dec!(315)));
        assert_eq!(saved[0].exit_reason, Some(ExitReason::ProfitTarget));
        assert_eq!(saved[0].order_id.as_deref(), Some("ORD1"));
        assert_eq!(saved[0].stop_loss, dec!(74950));
        assert!(store.open_positions().unwrap().is_empty());
    }

    #[test]
    fn update_requires_id() {
        let store = store();
        let position = open_position(dec!(100), 20, market_hours());
        assert!(store.update_position(&position).is_err());
    }

    #[test]
    fn ids_increase() {
        let store = store();
        let position = open_position(dec!(100), 20, market_hours());
        let a = store.save_position(&position, trading_day()).unwrap();
        let b = store.save_position(&position, trading_day()).unwrap();
        assert!(b > a);
    }

    #[test]
    fn session_upserts_by_date() {
        let store = store();
        let mut session = TradingSession::new(trading_day(), market_hours());
        session.record_signal();
        store.save_session(&session).unwrap();

        session.record_open();
        session.record_close(dec!(-120.5));
        session.record_error("ltp timeout");
        session.record_sensex_entry(dec!(75012.35));
        store.save_session(&session).unwrap();

        let loaded = store.session_for_date(trading_day()).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store
            .session_for_date(trading_day() + Duration::days(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn alerts_filter_by_ist_day_and_type() {
        let store = store();
        let day = trading_day();
        // 00:10 IST on the day is still the previous UTC date.
        let early = ist(day, 0, 10);
        let late = ist(day, 23, 50);
        let next = ist(day + Duration::days(1), 0, 5);

        store
            .save_alert(&AlertRecord::new(
                AlertKind::RiskViolation,
                "max trades",
                serde_json::json!({"code": "max_daily_trades"}),
                early,
            ))
            .unwrap();
        store
            .save_alert(&AlertRecord::new(
                AlertKind::Error,
                "ltp timeout",
                serde_json::Value::Null,
                late,
            ))
            .unwrap();
        store
            .save_alert(&AlertRecord::new(
                AlertKind::RiskViolation,
                "tomorrow",
                serde_json::Value::Null,
                next,
            ))
            .unwrap();

        let all = store.alerts_for_date(day, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].metadata["code"], "max_daily_trades");

        let risk = store.alerts_for_date(day, Some("RISK_VIOLATION")).unwrap();
        assert_eq!(risk.len(), 1);
        assert_eq!(risk[0].message, "max trades");
    }

    #[test]
    fn risk_reset_date_round_trips() {
        let store = store();
        assert_eq!(store.last_risk_reset().unwrap(), None);
        store.set_last_risk_reset(trading_day()).unwrap();
        store
            .set_last_risk_reset(trading_day() + Duration::days(1))
            .unwrap();
        assert_eq!(
            store.last_risk_reset().unwrap(),
            Some(trading_day() + Duration::days(1))
        );
    }

    #[test]
    fn ping_succeeds() {
        store().ping().unwrap();
    }
}
