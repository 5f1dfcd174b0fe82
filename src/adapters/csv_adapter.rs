//! CSV file data adapter.
//!
//! Bars: `timestamp,open,high,low,close,volume` (a `date` header is accepted
//! for `timestamp`). Signals: `timestamp,score[,volatility]`, where an empty or
//! `NaN` score means "no opinion" for that bar.

use crate::domain::error::QuantsimError;
use crate::domain::ohlcv::{Bar, BarSeries};
use crate::domain::signal::SignalRow;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "date", alias = "datetime")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct SignalRecord {
    #[serde(alias = "date", alias = "datetime")]
    timestamp: String,
    #[serde(alias = "prediction", alias = "signal")]
    score: Option<f64>,
    #[serde(default)]
    volatility: Option<f64>,
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, QuantsimError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| QuantsimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })
}

fn timestamp_at(path: &Path, row: usize, value: &str) -> Result<NaiveDateTime, QuantsimError> {
    parse_timestamp(value).ok_or_else(|| QuantsimError::Data {
        reason: format!(
            "{} row {}: invalid timestamp '{}'",
            path.display(),
            row + 1,
            value
        ),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        CsvAdapter
    }
}

impl DataPort for CsvAdapter {
    fn load_bars(&self, path: &Path, symbol: &str) -> Result<BarSeries, QuantsimError> {
        let mut reader = open_reader(path)?;
        let mut bars = Vec::new();

        for (row, result) in reader.deserialize::<BarRecord>().enumerate() {
            let record = result.map_err(|e| QuantsimError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            bars.push(Bar {
                timestamp: timestamp_at(path, row, &record.timestamp)?,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        debug!(path = %path.display(), symbol, bars = bars.len(), "loaded bars");
        BarSeries::new(symbol, bars)
    }

    fn load_signals(&self, path: &Path) -> Result<Vec<SignalRow>, QuantsimError> {
        let mut reader = open_reader(path)?;
        let mut rows = Vec::new();

        for (row, result) in reader.deserialize::<SignalRecord>().enumerate() {
            let record = result.map_err(|e| QuantsimError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            rows.push(SignalRow {
                timestamp: timestamp_at(path, row, &record.timestamp)?,
                score: record.score.filter(|s| !s.is_nan()),
                volatility: record.volatility.filter(|v| !v.is_nan()),
            });
        }

        debug!(path = %path.display(), rows = rows.len(), "loaded signals");
        Ok(rows)
    }
}
