//! Parameter sweeps over independent engines.
//!
//! Every configuration gets its own [`BacktestEngine`]; the bar series and the
//! signal source are shared read-only across rayon workers.

use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use tracing::info;

use super::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use super::error::QuantsimError;
use super::ohlcv::BarSeries;
use super::signal::SignalSource;
use super::sizing::RiskParameters;

/// One configuration per position fraction, everything else from `base`.
pub fn fraction_grid(base: &BacktestConfig, fractions: &[f64]) -> Vec<BacktestConfig> {
    fractions
        .iter()
        .map(|&fraction| BacktestConfig {
            risk: RiskParameters {
                max_position_fraction: fraction,
                ..base.risk
            },
            ..base.clone()
        })
        .collect()
}

pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        ParamSweep { parallel: true }
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Results come back in the order of `configs`. Any invalid configuration
    /// fails the whole sweep before a bar is processed.
    pub fn run(
        &self,
        configs: &[BacktestConfig],
        series: &BarSeries,
        source: &dyn SignalSource,
    ) -> Result<Vec<BacktestResult>, QuantsimError> {
        let never = AtomicBool::new(false);
        self.run_with_cancel(configs, series, source, &never)
    }

    pub fn run_with_cancel(
        &self,
        configs: &[BacktestConfig],
        series: &BarSeries,
        source: &dyn SignalSource,
        cancel: &AtomicBool,
    ) -> Result<Vec<BacktestResult>, QuantsimError> {
        let engines = configs
            .iter()
            .cloned()
            .map(BacktestEngine::new)
            .collect::<Result<Vec<_>, _>>()?;

        info!(runs = engines.len(), parallel = self.parallel, "starting sweep");

        let run_one = |mut engine: BacktestEngine| engine.run_with_cancel(series, source, cancel);

        if self.parallel {
            engines.into_par_iter().map(run_one).collect()
        } else {
            engines.into_iter().map(run_one).collect()
        }
    }
}
