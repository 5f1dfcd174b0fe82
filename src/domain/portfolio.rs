//! Account state and equity tracking for a single-asset run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub position_value: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Back to the initial state: all cash, flat, empty logs.
    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.position = None;
        self.trades.clear();
        self.equity_curve.clear();
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn position_value(&self, price: f64) -> f64 {
        self.position
            .as_ref()
            .map(|pos| pos.market_value(price))
            .unwrap_or(0.0)
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash + self.position_value(price)
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Mark the account to `close` and append the point.
    pub fn record_equity(&mut self, timestamp: NaiveDateTime, close: f64) -> &EquityPoint {
        let position_value = self.position_value(close);
        self.equity_curve.push(EquityPoint {
            timestamp,
            cash: self.cash,
            position_value,
            equity: self.cash + position_value,
        });
        &self.equity_curve[self.equity_curve.len() - 1]
    }
}
