//! Window indicators evaluated over the tail of a bar history.
//!
//! Every function looks only at the last `period` (+1 where a previous close is
//! needed) bars of the slice it is given and returns `None` during warm-up, so a
//! signal source calling them on `bars[..=i]` can never see the future.

use crate::domain::ohlcv::Bar;

/// Simple moving average of `values` ending at the last element.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Population standard deviation of the last `period` values.
pub fn stddev(values: &[f64], period: usize) -> Option<f64> {
    let mean = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    Some(variance.sqrt())
}

/// RSI over the last `period` close-to-close changes, using simple averages.
///
/// If the average loss is zero the RSI is 100.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let tail = &closes[closes.len() - period - 1..];
    let (gain, loss) = tail.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let change = w[1] - w[0];
        if change > 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });
    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
}

/// Average true range over the last `period` bars.
///
/// Needs `period + 1` bars so that every true range has a previous close.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let tail = &bars[bars.len() - period - 1..];
    let total: f64 = tail
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .sum();
    Some(total / period as f64)
}

/// Lower Bollinger band: SMA minus `k` standard deviations.
pub fn bollinger_lower(closes: &[f64], period: usize, k: f64) -> Option<f64> {
    let middle = sma(closes, period)?;
    let sd = stddev(closes, period)?;
    Some(middle - k * sd)
}
