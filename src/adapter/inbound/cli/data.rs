//! Handlers for the `data` commands.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use crate::adapter::inbound::cli::command::{
    CollectArgs, ConfigPathArg, DataCommand, DataListArgs, ReplayArgs,
};
use crate::adapter::inbound::cli::output;
use crate::adapter::inbound::cli::report::PositionRow;
use crate::adapter::inbound::cli::run::load_config;
use crate::adapter::outbound::sqlite::SqliteStore;
use crate::application::data::{replay_day, ReplayReport, ReplaySettings};
use crate::domain::calendar::ist_date;
use crate::error::Result;
use crate::infrastructure::bootstrap::{
    build_archive, build_broker, build_collector, build_credentials, build_kite,
    build_notifier_registry,
};
use crate::port::outbound::archive::DayMetadata;

pub async fn execute(command: &DataCommand) -> Result<()> {
    match command {
        DataCommand::Collect(args) => execute_collect(args).await,
        DataCommand::List(args) => execute_list(args),
        DataCommand::Replay(args) => execute_replay(args).await,
        DataCommand::Cleanup(args) => execute_cleanup(args),
    }
}

async fn execute_collect(args: &CollectArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let credentials = build_credentials(&config);
    let kite = build_kite(&config, credentials.as_ref())?;
    let broker = build_broker(&config, kite.as_ref())?;
    let collector = build_collector(&config, broker, Arc::new(build_notifier_registry(&config)))?;

    let now = Utc::now();
    let date = args.date.unwrap_or_else(|| ist_date(now));
    let pb = output::spinner(&format!("Collecting {date}..."));
    let report = match collector.collect_date(date, now).await {
        Ok(report) => report,
        Err(e) => {
            output::spinner_fail(&pb, "Collection failed");
            return Err(e);
        }
    };
    output::spinner_success(
        &pb,
        &format!("{}/{} series archived", report.metadata.files, report.expected),
    );

    if output::is_json() {
        output::json_output(json!({
            "command": "data.collect",
            "report": report,
        }));
        return Ok(());
    }
    output::field("Date", report.metadata.date);
    output::field("ATM strike", report.metadata.atm_strike);
    output::field("Directory", &config.data.dir);
    for symbol in &report.missing {
        output::warning(&format!("{symbol} not collected"));
    }
    Ok(())
}

#[derive(Debug, Tabled, Serialize)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Files")]
    files: String,
    #[tabled(rename = "ATM")]
    atm: String,
    #[tabled(rename = "SENSEX")]
    sensex: String,
}

impl DayRow {
    fn new(date: chrono::NaiveDate, metadata: Option<&DayMetadata>) -> Self {
        let price = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        match metadata {
            Some(m) => Self {
                date: date.to_string(),
                files: m.files.to_string(),
                atm: m.atm_strike.to_string(),
                sensex: format!("{} → {}", price(m.sensex_open), price(m.sensex_close)),
            },
            None => Self {
                date: date.to_string(),
                files: "-".to_string(),
                atm: "-".to_string(),
                sensex: "-".to_string(),
            },
        }
    }
}

fn execute_list(args: &DataListArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let archive = build_archive(&config);
    let rows = archive
        .list_dates(args.limit)?
        .into_iter()
        .map(|date| -> Result<DayRow> { Ok(DayRow::new(date, archive.metadata(date)?.as_ref())) })
        .collect::<Result<Vec<_>>>()?;

    if output::is_json() {
        output::json_output(json!({
            "command": "data.list",
            "dir": config.data.dir,
            "days": rows,
        }));
        return Ok(());
    }
    output::section(&format!("Archived days in {}", config.data.dir));
    if rows.is_empty() {
        output::note("Nothing collected yet");
    } else {
        output::table(&rows);
    }
    Ok(())
}

fn print_replay(report: &ReplayReport) {
    output::section(&format!("Replay {}", report.date));
    if let Some(atm) = report.atm_strike {
        output::field("ATM strike", atm);
    }
    if let (Some(open), Some(close)) = (report.sensex_open, report.sensex_close) {
        output::field("SENSEX", format!("{open:.2} → {close:.2}"));
    }
    output::field("Cycles", report.cycles);
    output::field("Signals", report.signals);
    output::field("Trades", report.trades.len());
    output::field("Total P&L", output::rupees(report.total_pnl));
    output::field("Win rate", format!("{}%", report.win_rate));
    output::field("Max drawdown", output::rupees(-report.max_drawdown));
    if let Some(minutes) = report.avg_hold_minutes {
        output::field("Avg hold", format!("{minutes:.0} min"));
    }
    output::field("Blocked", report.blocked);
    for reason in &report.block_reasons {
        output::note(reason);
    }
    if report.errors > 0 {
        output::warning(&format!("{} cycles failed", report.errors));
    }
}

async fn execute_replay(args: &ReplayArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let archive = build_archive(&config);
    let store = Arc::new(SqliteStore::open(":memory:")?);
    let settings = ReplaySettings {
        limits: config.risk_limits(),
        engine: config.strategy.engine_settings()?,
        calendar: config.market.calendar()?,
    };

    let pb = output::spinner(&format!("Replaying {}...", args.date));
    let report = match replay_day(archive.as_ref(), args.date, store, settings).await {
        Ok(report) => report,
        Err(e) => {
            output::spinner_fail(&pb, "Replay failed");
            return Err(e);
        }
    };
    output::spinner_success(&pb, "Replay complete");
    let rows: Vec<PositionRow> = report.trades.iter().map(PositionRow::from).collect();

    if output::is_json() {
        output::json_output(json!({
            "command": "data.replay",
            "report": report,
        }));
        return Ok(());
    }
    print_replay(&report);
    if !rows.is_empty() {
        output::section("Trades");
        output::table(&rows);
    }
    Ok(())
}

fn execute_cleanup(args: &ConfigPathArg) -> Result<()> {
    let config = load_config(&args.config)?;
    let archive = build_archive(&config);
    let cutoff = ist_date(Utc::now()) - Duration::days(i64::from(config.data.retention_days));
    let moved = archive.archive_before(cutoff)?;

    if output::is_json() {
        output::json_output(json!({
            "command": "data.cleanup",
            "cutoff": cutoff,
            "archived": moved,
        }));
        return Ok(());
    }
    if moved.is_empty() {
        output::note(&format!("Nothing older than {cutoff}"));
    } else {
        output::success(&format!("Archived {} days before {cutoff}", moved.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{ist, trading_day};

    #[test]
    fn uncollected_day_row_is_blank() {
        let row = DayRow::new(trading_day(), None);
        assert_eq!(row.files, "-");
        assert_eq!(row.sensex, "-");
    }

    #[test]
    fn collected_day_row_shows_the_range() {
        let metadata = DayMetadata {
            date: trading_day(),
            collected_at: ist(trading_day(), 15, 26),
            atm_strike: 75_000,
            strikes: vec![74_500, 75_000, 75_500],
            files: 7,
            sensex_open: Some(74_950.0),
            sensex_close: None,
        };
        let row = DayRow::new(trading_day(), Some(&metadata));
        assert_eq!(row.date, "2025-01-06");
        assert_eq!(row.files, "7");
        assert_eq!(row.atm, "75000");
        assert_eq!(row.sensex, "74950.00 → -");
    }
}
