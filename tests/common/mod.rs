#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use quantsim::domain::backtest::BacktestConfig;
use quantsim::domain::error::QuantsimError;
pub use quantsim::domain::ohlcv::{Bar, BarSeries};
use quantsim::domain::execution::ExecutionConfig;
use quantsim::domain::signal::SignalRow;
use quantsim::domain::sizing::RiskParameters;
use quantsim::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// In-memory data port keyed by file path.
pub struct MockDataPort {
    pub bars: HashMap<PathBuf, Vec<Bar>>,
    pub signals: HashMap<PathBuf, Vec<SignalRow>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            signals: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, path: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(PathBuf::from(path), bars);
        self
    }

    pub fn with_signals(mut self, path: &str, rows: Vec<SignalRow>) -> Self {
        self.signals.insert(PathBuf::from(path), rows);
        self
    }
}

impl DataPort for MockDataPort {
    fn load_bars(&self, path: &Path, symbol: &str) -> Result<BarSeries, QuantsimError> {
        let bars = self.bars.get(path).cloned().ok_or_else(|| QuantsimError::Data {
            reason: format!("no bars at {}", path.display()),
        })?;
        BarSeries::new(symbol, bars)
    }

    fn load_signals(&self, path: &Path) -> Result<Vec<SignalRow>, QuantsimError> {
        self.signals.get(path).cloned().ok_or_else(|| QuantsimError::Data {
            reason: format!("no signals at {}", path.display()),
        })
    }
}

pub fn ts(day: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(day)
}

pub fn make_bar(day: i64, close: f64) -> Bar {
    Bar {
        timestamp: ts(day),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect()
}

pub fn make_series(closes: &[f64]) -> BarSeries {
    BarSeries::new("TEST", bars_from_closes(closes)).unwrap()
}

/// Deterministic zig-zag around an upward drift.
pub fn generate_closes(count: usize, start_price: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let wave = ((i % 7) as f64 - 3.0) * 0.8;
            start_price + i as f64 * 0.3 + wave
        })
        .collect()
}

pub fn signal_rows(bars: &[Bar], scores: &[Option<f64>]) -> Vec<SignalRow> {
    bars.iter()
        .zip(scores)
        .map(|(b, &score)| SignalRow {
            timestamp: b.timestamp,
            score,
            volatility: Some(0.02),
        })
        .collect()
}

pub fn frictionless_config(fraction: f64) -> BacktestConfig {
    BacktestConfig {
        initial_capital: 100_000.0,
        execution: ExecutionConfig {
            commission: 0.0,
            slippage: 0.0,
        },
        risk: RiskParameters {
            max_position_fraction: fraction,
            risk_per_trade: 0.02,
        },
        ..BacktestConfig::default()
    }
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn bars_csv(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars_from_closes(closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}

pub fn signals_csv(count: usize, score: impl Fn(usize) -> Option<f64>) -> String {
    let mut out = String::from("timestamp,score\n");
    for i in 0..count {
        let value = score(i).map(|s| s.to_string()).unwrap_or_default();
        out.push_str(&format!("{},{}\n", ts(i as i64).format("%Y-%m-%d"), value));
    }
    out
}

/// `ExitCode` has no `PartialEq`; compare the debug rendering instead.
pub fn assert_exit_code(actual: ExitCode, expected: u8) {
    assert_eq!(
        format!("{actual:?}"),
        format!("{:?}", ExitCode::from(expected))
    );
}
