//! Collected market data on disk.

mod csv_dir;

pub use csv_dir::CsvCandleArchive;
