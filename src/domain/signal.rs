//! Trading signals and the signal source contract.
//!
//! A signal source sees only the bar history up to and including the bar being
//! evaluated; the engine enforces this by handing it `&bars[..=i]`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::QuantsimError;
use super::ohlcv::{Bar, BarSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}

/// Score cut-offs used to turn a numeric model output into a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub buy_above: f64,
    pub sell_below: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            buy_above: 0.0,
            sell_below: 0.0,
        }
    }
}

impl SignalThresholds {
    /// Undefined or NaN scores map to Hold.
    pub fn classify(&self, score: Option<f64>) -> Signal {
        match score {
            Some(s) if s.is_nan() => Signal::Hold,
            Some(s) if s > self.buy_above => Signal::Buy,
            Some(s) if s < self.sell_below => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}

/// Produces one signal per bar from bar history.
///
/// `history` always ends with the bar being evaluated. Implementations must be
/// deterministic and must not keep mutable state between calls.
pub trait SignalSource: Send + Sync {
    fn name(&self) -> &str;

    fn signal(&self, history: &[Bar]) -> Signal;

    /// Volatility estimate for the last bar of `history`, used by risk-parity sizing.
    fn volatility(&self, _history: &[Bar]) -> Option<f64> {
        None
    }

    /// Number of bars this source was built for, if it is a fixed series.
    fn expected_len(&self) -> Option<usize> {
        None
    }
}

/// One row of an externally produced score file.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub timestamp: NaiveDateTime,
    pub score: Option<f64>,
    pub volatility: Option<f64>,
}

/// A bar-aligned series of model scores computed before the run.
#[derive(Debug, Clone)]
pub struct PrecomputedSignals {
    scores: Vec<Option<f64>>,
    volatility: Vec<Option<f64>>,
    thresholds: SignalThresholds,
}

impl PrecomputedSignals {
    pub fn new(scores: Vec<Option<f64>>, thresholds: SignalThresholds) -> Self {
        let volatility = vec![None; scores.len()];
        PrecomputedSignals {
            scores,
            volatility,
            thresholds,
        }
    }

    /// Series of explicit signals, mainly for tests and scripted scenarios.
    pub fn from_signals(signals: &[Signal]) -> Self {
        let scores = signals
            .iter()
            .map(|s| match s {
                Signal::Buy => Some(1.0),
                Signal::Sell => Some(-1.0),
                Signal::Hold => None,
            })
            .collect();
        Self::new(scores, SignalThresholds::default())
    }

    /// Pair score rows with bars one-to-one, checking count and timestamps.
    pub fn aligned(
        series: &BarSeries,
        rows: &[SignalRow],
        thresholds: SignalThresholds,
    ) -> Result<Self, QuantsimError> {
        if rows.len() != series.len() {
            return Err(QuantsimError::SignalLengthMismatch {
                bars: series.len(),
                signals: rows.len(),
            });
        }
        for (index, (bar, row)) in series.bars().iter().zip(rows).enumerate() {
            if bar.timestamp != row.timestamp {
                return Err(QuantsimError::SignalMisaligned {
                    index,
                    bar: bar.timestamp,
                    signal: row.timestamp,
                });
            }
        }
        let scores = rows.iter().map(|r| r.score).collect();
        let volatility = rows.iter().map(|r| r.volatility).collect();
        Ok(Self::new(scores, thresholds).with_volatility(volatility))
    }

    /// Attach a per-bar volatility series. Entries beyond the score length are ignored.
    pub fn with_volatility(mut self, volatility: Vec<Option<f64>>) -> Self {
        for (slot, v) in self.volatility.iter_mut().zip(volatility) {
            *slot = v;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl SignalSource for PrecomputedSignals {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn signal(&self, history: &[Bar]) -> Signal {
        let Some(index) = history.len().checked_sub(1) else {
            return Signal::Hold;
        };
        self.thresholds
            .classify(self.scores.get(index).copied().flatten())
    }

    fn volatility(&self, history: &[Bar]) -> Option<f64> {
        let index = history.len().checked_sub(1)?;
        self.volatility.get(index).copied().flatten()
    }

    fn expected_len(&self) -> Option<usize> {
        Some(self.scores.len())
    }
}
