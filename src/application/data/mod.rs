//! Market data archive: end-of-day collection and replay.

mod collector;
mod replay;

pub use collector::{CollectionReport, CollectorSettings, DataCollector};
pub use replay::{replay_day, ReplayBroker, ReplayReport, ReplaySettings};
