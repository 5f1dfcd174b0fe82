//! Pre-trade risk gate.
//!
//! A rejection is an ordinary [`RiskDecision`], not an error: the engine logs
//! it and stays flat.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative slack on exposure comparisons so that an exact full-fraction entry
/// is not rejected by rounding in `quantity * price`.
const EXPOSURE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_fraction: f64,
    /// Stop opening positions once drawdown from peak equity exceeds this.
    pub max_drawdown: Option<f64>,
    /// Reject candidates whose returns correlate above this with an open position.
    pub max_correlation: Option<f64>,
    /// Trailing returns used for historical VaR.
    pub var_window: usize,
    /// VaR confidence level in (0, 1); 0.95 reads the 5th percentile.
    pub var_confidence: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_position_fraction: 0.1,
            max_drawdown: None,
            max_correlation: None,
            var_window: 20,
            var_confidence: 0.95,
        }
    }
}

/// Everything the gate needs to judge one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryProposal {
    pub position_value: f64,
    /// Value of positions already open, excluding the proposal.
    pub open_position_value: f64,
    pub account_value: f64,
    pub peak_equity: f64,
}

impl EntryProposal {
    /// (peak - current) / peak, zero when the peak is not positive.
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity > 0.0 {
            ((self.peak_equity - self.account_value) / self.peak_equity).max(0.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    PositionSize { value: f64, limit: f64 },
    TotalExposure { value: f64, limit: f64 },
    Drawdown { drawdown: f64, limit: f64 },
    Correlation { correlation: f64, limit: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PositionSize { value, limit } => {
                write!(f, "position value {value:.2} exceeds limit {limit:.2}")
            }
            RejectReason::TotalExposure { value, limit } => {
                write!(f, "total exposure {value:.2} exceeds limit {limit:.2}")
            }
            RejectReason::Drawdown { drawdown, limit } => {
                write!(f, "drawdown {:.2}% exceeds limit {:.2}%", drawdown * 100.0, limit * 100.0)
            }
            RejectReason::Correlation { correlation, limit } => {
                write!(f, "correlation {correlation:.3} exceeds limit {limit:.3}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskDecision {
    Approved,
    Rejected(RejectReason),
}

impl RiskDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskDecision::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        RiskManager { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Checks run in order: single position size, aggregate exposure, drawdown.
    pub fn check_entry(&self, proposal: &EntryProposal) -> RiskDecision {
        let limit = self.limits.max_position_fraction * proposal.account_value;
        let slack = limit.abs() * EXPOSURE_TOLERANCE;

        if proposal.position_value > limit + slack {
            return RiskDecision::Rejected(RejectReason::PositionSize {
                value: proposal.position_value,
                limit,
            });
        }

        let total = proposal.open_position_value + proposal.position_value;
        if total > limit + slack {
            return RiskDecision::Rejected(RejectReason::TotalExposure { value: total, limit });
        }

        if let Some(max_dd) = self.limits.max_drawdown {
            let drawdown = proposal.drawdown();
            if drawdown > max_dd {
                return RiskDecision::Rejected(RejectReason::Drawdown {
                    drawdown,
                    limit: max_dd,
                });
            }
        }

        RiskDecision::Approved
    }

    /// Multi-asset check: compare the candidate's close series against every
    /// open position's close series.
    ///
    /// Correlation is taken on simple returns over the common tail. Pairs with
    /// fewer than two returns or zero variance cannot be judged and pass.
    pub fn check_correlation(&self, candidate: &[f64], open: &[&[f64]]) -> RiskDecision {
        let Some(limit) = self.limits.max_correlation else {
            return RiskDecision::Approved;
        };
        let candidate_returns = simple_returns(candidate);
        for series in open {
            let returns = simple_returns(series);
            let n = candidate_returns.len().min(returns.len());
            let a = &candidate_returns[candidate_returns.len() - n..];
            let b = &returns[returns.len() - n..];
            if let Some(correlation) = pearson(a, b) {
                if correlation > limit {
                    return RiskDecision::Rejected(RejectReason::Correlation { correlation, limit });
                }
            }
        }
        RiskDecision::Approved
    }

    /// Historical VaR over the configured window and confidence.
    pub fn trailing_var(&self, returns: &[f64]) -> Option<f64> {
        Self::value_at_risk(returns, self.limits.var_window, self.limits.var_confidence)
    }

    /// The `(1 - confidence)` percentile of the last `window` returns, with
    /// linear interpolation between order statistics. A loss reads negative.
    ///
    /// `None` when fewer than `window` returns exist, the window holds fewer
    /// than two finite values, or `confidence` is outside (0, 1).
    pub fn value_at_risk(returns: &[f64], window: usize, confidence: f64) -> Option<f64> {
        if window < 2 || returns.len() < window || !(confidence > 0.0 && confidence < 1.0) {
            return None;
        }
        let mut tail: Vec<f64> = returns[returns.len() - window..]
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .collect();
        if tail.len() < 2 {
            return None;
        }
        tail.sort_by(f64::total_cmp);

        let rank = (1.0 - confidence) * (tail.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;
        Some(tail[lower] + (tail[upper] - tail[lower]) * weight)
    }
}

fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Pearson correlation, `None` for fewer than two points or zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
