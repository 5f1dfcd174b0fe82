//! Data access port trait.

use crate::domain::error::QuantsimError;
use crate::domain::ohlcv::BarSeries;
use crate::domain::signal::SignalRow;
use std::path::Path;

pub trait DataPort {
    /// Bars for one symbol, validated into a [`BarSeries`].
    fn load_bars(&self, path: &Path, symbol: &str) -> Result<BarSeries, QuantsimError>;

    /// Precomputed score rows in file order.
    fn load_signals(&self, path: &Path) -> Result<Vec<SignalRow>, QuantsimError>;
}
