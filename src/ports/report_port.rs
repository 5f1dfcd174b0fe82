//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::QuantsimError;
use std::path::Path;

/// One labelled run of a parameter sweep.
#[derive(Debug, Clone)]
pub struct SweepEntry<'a> {
    pub label: String,
    pub result: &'a BacktestResult,
}

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), QuantsimError>;

    /// Default implementation: one full report per run, in a subdirectory
    /// named after its label.
    fn write_sweep(&self, entries: &[SweepEntry<'_>], output_dir: &Path) -> Result<(), QuantsimError> {
        for entry in entries {
            self.write(entry.result, &output_dir.join(&entry.label))?;
        }
        Ok(())
    }
}
