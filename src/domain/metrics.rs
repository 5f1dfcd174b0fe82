//! Performance metrics computed once per completed run.
//!
//! Edge cases are explicit: a metric that cannot be computed is an
//! [`UndefinedMetric`] (reported as `None`), and profit factor distinguishes
//! "no trades" from "no losses".

use serde::{Serialize, Serializer};
use std::fmt;

use super::portfolio::EquityPoint;
use super::position::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UndefinedMetric {
    #[error("fewer than two return observations")]
    InsufficientSamples,
    #[error("returns have zero variance")]
    ZeroVariance,
    #[error("no time elapsed between first and last equity point")]
    ZeroElapsedTime,
    #[error("result overflows or is not a number")]
    NonFinite,
}

/// Gross profit over gross loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Finite(f64),
    /// Profitable trades and no losing ones.
    Infinite,
}

impl ProfitFactor {
    pub fn as_f64(&self) -> f64 {
        match self {
            ProfitFactor::Finite(v) => *v,
            ProfitFactor::Infinite => f64::INFINITY,
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{v:.2}"),
            ProfitFactor::Infinite => write!(f, "inf"),
        }
    }
}

impl Serialize for ProfitFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfitFactor::Finite(v) => serializer.serialize_f64(*v),
            ProfitFactor::Infinite => serializer.serialize_str("infinite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: ProfitFactor,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl Metrics {
    pub fn compute(equity_curve: &[EquityPoint], trades: &[Trade], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let returns = period_returns(equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        let closed: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_exit())
            .filter_map(|t| t.pnl)
            .collect();
        for &pnl in &closed {
            if pnl > 0.0 {
                trades_won += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let trade_count = closed.len();
        let win_rate = if trade_count > 0 {
            trades_won as f64 / trade_count as f64
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            gross_profit / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            gross_loss / trades_lost as f64
        } else {
            0.0
        };

        Metrics {
            final_equity,
            total_return,
            annualized_return: annualized_return(equity_curve, initial_capital).ok(),
            sharpe_ratio: sharpe_ratio(&returns).ok(),
            max_drawdown: max_drawdown(equity_curve),
            trade_count,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor: profit_factor(gross_profit, gross_loss),
            gross_profit,
            gross_loss,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

/// Simple returns between consecutive equity points with a positive base.
pub fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect()
}

/// (final / initial)^(365 / elapsed_days) - 1, with fractional elapsed days.
pub fn annualized_return(
    equity_curve: &[EquityPoint],
    initial_capital: f64,
) -> Result<f64, UndefinedMetric> {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return Err(UndefinedMetric::ZeroElapsedTime);
    };
    let elapsed_days = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
    if elapsed_days <= 0.0 {
        return Err(UndefinedMetric::ZeroElapsedTime);
    }
    if initial_capital <= 0.0 {
        return Err(UndefinedMetric::InsufficientSamples);
    }
    let ratio = last.equity / initial_capital;
    let annualized = ratio.powf(CALENDAR_DAYS_PER_YEAR / elapsed_days) - 1.0;
    if !annualized.is_finite() {
        return Err(UndefinedMetric::NonFinite);
    }
    Ok(annualized)
}

/// sqrt(252) * mean / sample standard deviation.
pub fn sharpe_ratio(returns: &[f64]) -> Result<f64, UndefinedMetric> {
    if returns.len() < 2 {
        return Err(UndefinedMetric::InsufficientSamples);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev == 0.0 || !stddev.is_finite() {
        return Err(UndefinedMetric::ZeroVariance);
    }
    Ok(TRADING_DAYS_PER_YEAR.sqrt() * mean / stddev)
}

/// Most negative (equity - running_peak) / running_peak; 0 if equity never dips.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.min((point.equity - peak) / peak);
        }
    }
    worst
}

pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> ProfitFactor {
    if gross_loss > 0.0 {
        ProfitFactor::Finite(gross_profit / gross_loss)
    } else if gross_profit > 0.0 {
        ProfitFactor::Infinite
    } else {
        ProfitFactor::Finite(0.0)
    }
}
