//! In-memory trade store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::domain::calendar::ist_date;
use crate::domain::{Position, TradingSession};
use crate::error::{Error, Result};
use crate::port::outbound::store::{AlertRecord, TradeStore};

#[derive(Default)]
struct Tables {
    positions: Vec<(NaiveDate, Position)>,
    sessions: BTreeMap<NaiveDate, TradingSession>,
    alerts: Vec<AlertRecord>,
    last_reset: Option<NaiveDate>,
}

/// [`TradeStore`] backed by vectors, with a switch to simulate outages.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn positions(&self) -> Vec<Position> {
        self.tables
            .lock()
            .positions
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.tables.lock().alerts.clone()
    }

    /// Alert types in insertion order.
    pub fn alert_types(&self) -> Vec<String> {
        self.tables
            .lock()
            .alerts
            .iter()
            .map(|a| a.alert_type.clone())
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Database("store unavailable".into()));
        }
        Ok(())
    }
}

impl TradeStore for MemoryStore {
    fn save_position(&self, position: &Position, trade_date: NaiveDate) -> Result<i64> {
        self.check()?;
        let mut tables = self.tables.lock();
        let id = i64::try_from(tables.positions.len()).unwrap_or(i64::MAX) + 1;
        let mut stored = position.clone();
        stored.id = Some(id);
        tables.positions.push((trade_date, stored));
        Ok(id)
    }

    fn update_position(&self, position: &Position) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.lock();
        let slot = tables
            .positions
            .iter_mut()
            .find(|(_, p)| p.id == position.id)
            .ok_or_else(|| Error::Database("position not found".into()))?;
        slot.1 = position.clone();
        Ok(())
    }

    fn positions_for_date(&self, date: NaiveDate) -> Result<Vec<Position>> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .positions
            .iter()
            .filter(|(d, _)| *d == date)
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn open_positions(&self) -> Result<Vec<Position>> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .positions
            .iter()
            .filter(|(_, p)| p.status.is_open())
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn save_session(&self, session: &TradingSession) -> Result<()> {
        self.check()?;
        self.tables
            .lock()
            .sessions
            .insert(session.date, session.clone());
        Ok(())
    }

    fn session_for_date(&self, date: NaiveDate) -> Result<Option<TradingSession>> {
        self.check()?;
        Ok(self.tables.lock().sessions.get(&date).cloned())
    }

    fn save_alert(&self, alert: &AlertRecord) -> Result<i64> {
        self.check()?;
        let mut tables = self.tables.lock();
        let id = i64::try_from(tables.alerts.len()).unwrap_or(i64::MAX) + 1;
        let mut stored = alert.clone();
        stored.id = Some(id);
        tables.alerts.push(stored);
        Ok(id)
    }

    fn alerts_for_date(
        &self,
        date: NaiveDate,
        alert_type: Option<&str>,
    ) -> Result<Vec<AlertRecord>> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .alerts
            .iter()
            .filter(|a| ist_date(a.timestamp) == date)
            .filter(|a| alert_type.map_or(true, |t| a.alert_type == t))
            .cloned()
            .collect())
    }

    fn last_risk_reset(&self) -> Result<Option<NaiveDate>> {
        self.check()?;
        Ok(self.tables.lock().last_reset)
    }

    fn set_last_risk_reset(&self, date: NaiveDate) -> Result<()> {
        self.check()?;
        self.tables.lock().last_reset = Some(date);
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.check()
    }
}
