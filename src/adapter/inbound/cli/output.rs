//! Terminal output for the CLI.
//!
//! Each helper prints a styled line, or with `--json` one
//! `{"type": ..., "payload": ...}` object per line. `--quiet` keeps only
//! warnings and errors.

use std::fmt::Display;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Flags shared by every handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    /// Count of `-v` flags.
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static OUTPUT: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn cell() -> &'static RwLock<OutputConfig> {
    OUTPUT.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn current() -> OutputConfig {
    *cell().read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Install the flags parsed from the command line.
pub fn configure(config: OutputConfig) {
    *cell().write().unwrap_or_else(std::sync::PoisonError::into_inner) = config;
}

#[must_use]
pub fn is_json() -> bool {
    current().json
}

#[must_use]
pub fn is_quiet() -> bool {
    current().quiet
}

#[must_use]
pub fn verbosity() -> u8 {
    current().verbose
}

/// How a line should be rendered under the current flags.
enum Sink {
    Json,
    Text,
    Drop,
}

fn sink(always: bool) -> Sink {
    let config = current();
    if config.json {
        Sink::Json
    } else if config.quiet && !always {
        Sink::Drop
    } else {
        Sink::Text
    }
}

fn emit(kind: &str, payload: Value) {
    println!("{}", json!({ "type": kind, "payload": payload }));
}

/// Emit `value` as-is for commands with their own JSON shape.
pub fn json_output(value: Value) {
    println!("{value}");
}

pub fn header(version: &str) {
    match sink(false) {
        Sink::Json => emit("header", json!({ "app": "sensexbot", "version": version })),
        Sink::Text => println!("{} {}\n", "sensexbot".bold(), version.dimmed()),
        Sink::Drop => {}
    }
}

pub fn section(title: &str) {
    match sink(false) {
        Sink::Json => emit("section", json!({ "title": title })),
        Sink::Text => println!("\n{}", title.bold()),
        Sink::Drop => {}
    }
}

/// `label` padded to a column, then `value`.
pub fn field(label: &str, value: impl Display) {
    let value = value.to_string();
    match sink(false) {
        Sink::Json => emit("field", json!({ "label": label, "value": value })),
        Sink::Text => println!("  {:<16} {}", label.dimmed(), value),
        Sink::Drop => {}
    }
}

pub fn success(message: &str) {
    match sink(false) {
        Sink::Json => emit("success", json!({ "message": message })),
        Sink::Text => println!("  {} {message}", "✓".green()),
        Sink::Drop => {}
    }
}

pub fn warning(message: &str) {
    match sink(true) {
        Sink::Json => emit("warning", json!({ "message": message })),
        _ => println!("  {} {message}", "!".yellow().bold()),
    }
}

/// Errors go to stderr in both modes.
pub fn error(message: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
    } else {
        eprintln!("  {} {message}", "×".red());
    }
}

pub fn note(message: &str) {
    match sink(false) {
        Sink::Json => emit("note", json!({ "message": message })),
        Sink::Text => println!("  {}", message.dimmed()),
        Sink::Drop => {}
    }
}

pub fn hint(message: &str) {
    match sink(false) {
        Sink::Json => emit("hint", json!({ "message": message })),
        Sink::Text => println!("  {} {}", "hint:".cyan(), message.dimmed()),
        Sink::Drop => {}
    }
}

/// Multi-line text, each line indented.
pub fn lines(content: &str) {
    match sink(false) {
        Sink::Json => emit("lines", json!({ "content": content })),
        Sink::Text => content.lines().for_each(|line| println!("  {line}")),
        Sink::Drop => {}
    }
}

/// A `tabled` table, or its rows as JSON.
pub fn table<T: tabled::Tabled + serde::Serialize>(rows: &[T]) {
    match sink(false) {
        Sink::Json => emit("table", json!({ "rows": rows })),
        Sink::Text => {
            let rendered = tabled::Table::new(rows).to_string();
            rendered.lines().for_each(|line| println!("  {line}"));
        }
        Sink::Drop => {}
    }
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner for a network call; hidden under `--json` or `--quiet`.
pub fn spinner(message: &str) -> ProgressBar {
    let config = current();
    let pb = if config.json || config.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(SPINNER_FRAMES)
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    };
    pb.set_message(message.to_string());
    pb
}

pub fn spinner_success(pb: &ProgressBar, message: &str) {
    match sink(false) {
        Sink::Json => {
            pb.finish_and_clear();
            emit("spinner_success", json!({ "message": message }));
        }
        Sink::Text => pb.finish_with_message(format!("{} {message}", "✓".green())),
        Sink::Drop => pb.finish_and_clear(),
    }
}

pub fn spinner_fail(pb: &ProgressBar, message: &str) {
    match sink(true) {
        Sink::Json => {
            pb.finish_and_clear();
            emit("spinner_fail", json!({ "message": message }));
        }
        _ => pb.finish_with_message(format!("{} {message}", "×".red())),
    }
}

fn styled(value: impl Display, paint: impl Fn(&str) -> String) -> String {
    let value = value.to_string();
    if is_json() {
        value
    } else {
        paint(&value)
    }
}

pub fn positive(value: impl Display) -> String {
    styled(value, |v| v.green().to_string())
}

pub fn negative(value: impl Display) -> String {
    styled(value, |v| v.red().to_string())
}

pub fn muted(value: impl Display) -> String {
    styled(value, |v| v.dimmed().to_string())
}

/// Rupee amount, green when non-negative and red otherwise.
pub fn rupees(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        negative(format!("-₹{}", amount.abs()))
    } else {
        positive(format!("₹{amount}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rupees_keeps_the_sign_outside_the_symbol() {
        configure(OutputConfig::new(true, false, 0));
        assert_eq!(rupees(dec!(-250.5)), "-₹250.5");
        assert_eq!(rupees(dec!(1200)), "₹1200");
        assert_eq!(muted("x"), "x");
    }
}
