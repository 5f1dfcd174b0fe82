//! CSV/JSON report adapter implementing ReportPort.
//!
//! Writes `trades.csv`, `equity.csv` and `summary.json` into the output
//! directory, creating it if needed. Sweeps add a `sweep.csv` comparison table.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantsimError;
use crate::domain::metrics::{Metrics, ProfitFactor};
use crate::domain::position::Position;
use crate::ports::report_port::{ReportPort, SweepEntry};

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const SWEEP_FILE: &str = "sweep.csv";

#[derive(Serialize)]
struct Summary<'a> {
    symbol: &'a str,
    strategy: &'a str,
    initial_capital: f64,
    #[serde(flatten)]
    metrics: &'a Metrics,
    value_at_risk: Option<f64>,
    bars_processed: usize,
    cancelled: bool,
    open_position: Option<&'a Position>,
}

#[derive(Serialize)]
struct SweepRow<'a> {
    label: &'a str,
    final_equity: f64,
    total_return: f64,
    annualized_return: Option<f64>,
    sharpe_ratio: Option<f64>,
    max_drawdown: f64,
    win_rate: f64,
    profit_factor: ProfitFactor,
    trade_count: usize,
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> QuantsimError {
    QuantsimError::Report {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), QuantsimError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| report_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), QuantsimError> {
        fs::create_dir_all(output_dir)?;

        write_csv(&output_dir.join(TRADES_FILE), &result.trades)?;
        write_csv(&output_dir.join(EQUITY_FILE), &result.equity_curve)?;

        let summary_path = output_dir.join(SUMMARY_FILE);
        let summary = Summary {
            symbol: &result.symbol,
            strategy: &result.strategy,
            initial_capital: result.initial_capital,
            metrics: &result.metrics,
            value_at_risk: result.value_at_risk,
            bars_processed: result.bars_processed,
            cancelled: result.cancelled,
            open_position: result.open_position.as_ref(),
        };
        let file = File::create(&summary_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .map_err(|e| report_err(&summary_path, e))?;

        info!(dir = %output_dir.display(), trades = result.trades.len(), "report written");
        Ok(())
    }

    fn write_sweep(&self, entries: &[SweepEntry<'_>], output_dir: &Path) -> Result<(), QuantsimError> {
        fs::create_dir_all(output_dir)?;
        let rows = entries.iter().map(|e| {
            let m = &e.result.metrics;
            SweepRow {
                label: &e.label,
                final_equity: m.final_equity,
                total_return: m.total_return,
                annualized_return: m.annualized_return,
                sharpe_ratio: m.sharpe_ratio,
                max_drawdown: m.max_drawdown,
                win_rate: m.win_rate,
                profit_factor: m.profit_factor,
                trade_count: m.trade_count,
            }
        });
        write_csv(&output_dir.join(SWEEP_FILE), rows)?;

        for entry in entries {
            self.write(entry.result, &output_dir.join(&entry.label))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestConfig, BacktestEngine};
    use crate::domain::ohlcv::{Bar, BarSeries};
    use crate::domain::signal::{PrecomputedSignals, Signal};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = [100.0, 104.0, 108.0, 103.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect();
        let series = BarSeries::new("TEST", bars).unwrap();
        let source = PrecomputedSignals::from_signals(&[
            Signal::Buy,
            Signal::Hold,
            Signal::Sell,
            Signal::Buy,
        ]);
        let mut engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
        engine.run(&series, &source).unwrap()
    }

    #[test]
    fn writes_all_three_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("report");
        let result = sample_result();
        CsvReportAdapter::new().write(&result, &out).unwrap();

        let trades = fs::read_to_string(out.join(TRADES_FILE)).unwrap();
        let mut lines = trades.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,side,price,quantity,amount,pnl,exit_reason"
        );
        assert_eq!(lines.count(), result.trades.len());
        assert!(trades.contains(",sell,"));
        assert!(trades.contains(",signal"));

        let equity = fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
        assert_eq!(equity.lines().count(), result.equity_curve.len() + 1);
        assert!(equity.starts_with("timestamp,cash,position_value,equity"));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["symbol"], "TEST");
        assert_eq!(summary["trade_count"], 1);
        assert_eq!(summary["bars_processed"], 4);
        assert!(summary["open_position"].is_object());
        assert!(summary["value_at_risk"].is_null());
        assert!(summary.get("trades").is_none());
    }

    #[test]
    fn sweep_writes_comparison_table_and_subreports() {
        let dir = TempDir::new().unwrap();
        let result = sample_result();
        let entries = vec![
            SweepEntry {
                label: "fraction_0.1".to_string(),
                result: &result,
            },
            SweepEntry {
                label: "fraction_0.2".to_string(),
                result: &result,
            },
        ];
        CsvReportAdapter::new()
            .write_sweep(&entries, dir.path())
            .unwrap();

        let table = fs::read_to_string(dir.path().join(SWEEP_FILE)).unwrap();
        assert_eq!(table.lines().count(), 3);
        assert!(table.starts_with("label,final_equity"));
        assert!(dir.path().join("fraction_0.2").join(SUMMARY_FILE).exists());
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = CsvReportAdapter::new()
            .write(&sample_result(), &blocker.join("sub"))
            .unwrap_err();
        assert!(matches!(err, QuantsimError::Io(_) | QuantsimError::Report { .. }));
    }
}
