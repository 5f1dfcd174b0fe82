//! Built-in signal sources selected by configuration.
//!
//! Each strategy is a pure function of bar history: parameters are fixed at
//! construction and nothing is cached between bars.

use crate::domain::error::QuantsimError;
use crate::domain::indicator_helpers::{atr, bollinger_lower, rsi, sma};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{Signal, SignalSource, SignalThresholds};

/// Which signal source a run uses.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    /// Model scores loaded alongside the bars.
    Precomputed { thresholds: SignalThresholds },
    TrendFollowing(TrendFollowing),
    Grid(GridTrading),
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Precomputed { .. } => "precomputed",
            StrategyConfig::TrendFollowing(_) => "trend_following",
            StrategyConfig::Grid(_) => "grid",
        }
    }
}

/// Moving-average trend follower confirmed by RSI, volume and Bollinger support.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFollowing {
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_window: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub volume_window: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub atr_window: usize,
}

impl Default for TrendFollowing {
    fn default() -> Self {
        TrendFollowing {
            short_window: 20,
            long_window: 50,
            rsi_window: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            volume_window: 20,
            bollinger_window: 20,
            bollinger_k: 2.0,
            atr_window: 14,
        }
    }
}

impl TrendFollowing {
    pub fn validate(&self) -> Result<(), QuantsimError> {
        let windows = [
            ("short_window", self.short_window),
            ("long_window", self.long_window),
            ("rsi_window", self.rsi_window),
            ("volume_window", self.volume_window),
            ("bollinger_window", self.bollinger_window),
            ("atr_window", self.atr_window),
        ];
        for (key, value) in windows {
            if value == 0 {
                return Err(QuantsimError::invalid("strategy", key, "window must be positive"));
            }
        }
        if self.short_window >= self.long_window {
            return Err(QuantsimError::invalid(
                "strategy",
                "short_window",
                "short_window must be less than long_window",
            ));
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return Err(QuantsimError::invalid(
                "strategy",
                "rsi_oversold",
                "RSI bounds must satisfy 0 <= oversold < overbought <= 100",
            ));
        }
        Ok(())
    }

    /// Bars needed before every indicator has a value.
    fn lookback(&self) -> usize {
        (self.long_window + 1)
            .max(self.rsi_window + 1)
            .max(self.volume_window)
            .max(self.bollinger_window)
            .max(self.atr_window + 1)
    }
}

impl SignalSource for TrendFollowing {
    fn name(&self) -> &str {
        "trend_following"
    }

    fn signal(&self, history: &[Bar]) -> Signal {
        let lookback = self.lookback();
        if history.len() < lookback {
            return Signal::Hold;
        }
        let tail = &history[history.len() - lookback..];
        let closes: Vec<f64> = tail.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = tail.iter().map(|b| b.volume).collect();
        let prev_closes = &closes[..closes.len() - 1];

        let indicators = (
            sma(&closes, self.short_window),
            sma(&closes, self.long_window),
            sma(prev_closes, self.short_window),
            sma(prev_closes, self.long_window),
            rsi(&closes, self.rsi_window),
            sma(&volumes, self.volume_window),
            bollinger_lower(&closes, self.bollinger_window, self.bollinger_k),
        );
        let (
            Some(short),
            Some(long),
            Some(prev_short),
            Some(prev_long),
            Some(rsi_value),
            Some(volume_ma),
            Some(lower_band),
        ) = indicators
        else {
            return Signal::Hold;
        };

        let last = &tail[tail.len() - 1];

        let sell = short < long || rsi_value > self.rsi_overbought || last.close < lower_band;
        if sell {
            return Signal::Sell;
        }

        let golden_cross = short > long && prev_short <= prev_long;
        let buy = golden_cross
            && rsi_value < self.rsi_oversold
            && last.volume > volume_ma
            && last.close > lower_band;
        if buy { Signal::Buy } else { Signal::Hold }
    }

    /// ATR relative to the last close.
    fn volatility(&self, history: &[Bar]) -> Option<f64> {
        let last = history.last()?;
        let value = atr(history, self.atr_window)?;
        Some(value / last.close)
    }
}

/// Fixed price grid: buy on upward crossings of a grid line, sell on downward ones.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTrading {
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_num: usize,
}

impl GridTrading {
    pub fn new(lower_price: f64, upper_price: f64, grid_num: usize) -> Result<Self, QuantsimError> {
        let grid = GridTrading {
            lower_price,
            upper_price,
            grid_num,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), QuantsimError> {
        if !self.lower_price.is_finite() || self.lower_price <= 0.0 {
            return Err(QuantsimError::invalid(
                "strategy",
                "lower_price",
                "lower_price must be positive",
            ));
        }
        if !self.upper_price.is_finite() || self.upper_price <= self.lower_price {
            return Err(QuantsimError::invalid(
                "strategy",
                "upper_price",
                "upper_price must be greater than lower_price",
            ));
        }
        if self.grid_num == 0 {
            return Err(QuantsimError::invalid(
                "strategy",
                "grid_num",
                "grid_num must be at least 1",
            ));
        }
        Ok(())
    }

    /// `grid_num + 1` evenly spaced levels from lower to upper.
    pub fn grid_lines(&self) -> Vec<f64> {
        let step = (self.upper_price - self.lower_price) / self.grid_num as f64;
        (0..=self.grid_num)
            .map(|i| self.lower_price + step * i as f64)
            .collect()
    }
}

impl SignalSource for GridTrading {
    fn name(&self) -> &str {
        "grid"
    }

    fn signal(&self, history: &[Bar]) -> Signal {
        let [.., prev, current] = history else {
            return Signal::Hold;
        };
        let price = current.close;
        let prev_price = prev.close;

        let lines = self.grid_lines();
        let mut signal = Signal::Hold;
        for cell in lines.windows(2) {
            let (lower, upper) = (cell[0], cell[1]);
            if price > lower && prev_price <= lower {
                signal = Signal::Buy;
            }
            if price < upper && prev_price >= upper {
                signal = Signal::Sell;
            }
        }
        signal
    }
}
