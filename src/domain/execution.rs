//! Fill simulation: slippage, commission and stop levels.
//!
//! Commission is a fraction of notional charged on both legs, so a round trip
//! costs `entry_notional * commission + exit_notional * commission`.

use serde::{Deserialize, Serialize};

use super::indicator_helpers::atr;
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Fraction of notional, in [0, 1).
    pub commission: f64,
    /// Adverse price move applied to market fills, >= 0.
    pub slippage: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission: 0.001,
            slippage: 0.001,
        }
    }
}

/// Buy fill: close * (1 + slippage)
pub fn apply_slippage_entry(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 + slippage)
}

/// Sell fill: close * (1 - slippage)
pub fn apply_slippage_exit(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 - slippage)
}

/// Cash paid to open: quantity * price * (1 + commission)
pub fn entry_cost(quantity: f64, price: f64, commission: f64) -> f64 {
    quantity * price * (1.0 + commission)
}

/// Cash received on close: quantity * price * (1 - commission)
pub fn exit_revenue(quantity: f64, price: f64, commission: f64) -> f64 {
    quantity * price * (1.0 - commission)
}

/// Realized pnl with commission on both legs.
pub fn realized_pnl(quantity: f64, entry_price: f64, exit_price: f64, commission: f64) -> f64 {
    exit_revenue(quantity, exit_price, commission) - entry_cost(quantity, entry_price, commission)
}

/// How stop-loss and take-profit levels are placed around an entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StopRule {
    #[default]
    None,
    /// Fractions of the entry price, e.g. 0.02 for 2%.
    Percent {
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    },
    /// Multiples of the ATR measured up to the entry bar.
    Atr {
        period: usize,
        stop_multiplier: f64,
        take_profit_multiplier: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StopLevels {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl StopLevels {
    /// Distance from entry to stop, used by fixed-risk sizing.
    pub fn stop_distance(&self, entry_price: f64) -> Option<f64> {
        self.stop_loss.map(|stop| entry_price - stop)
    }
}

impl StopRule {
    /// Levels for a long entry at `entry_price`; `history` ends with the entry bar.
    pub fn levels(&self, entry_price: f64, history: &[Bar]) -> StopLevels {
        match *self {
            StopRule::None => StopLevels::default(),
            StopRule::Percent {
                stop_loss,
                take_profit,
            } => StopLevels {
                stop_loss: stop_loss.map(|pct| entry_price * (1.0 - pct)),
                take_profit: take_profit.map(|pct| entry_price * (1.0 + pct)),
            },
            StopRule::Atr {
                period,
                stop_multiplier,
                take_profit_multiplier,
            } => match atr(history, period) {
                Some(value) => StopLevels {
                    stop_loss: Some(entry_price - stop_multiplier * value),
                    take_profit: Some(entry_price + take_profit_multiplier * value),
                },
                None => StopLevels::default(),
            },
        }
    }
}
