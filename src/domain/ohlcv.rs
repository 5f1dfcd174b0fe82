//! OHLCV bar representation and validated bar series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::QuantsimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Bars for one symbol, checked once at ingestion.
///
/// Timestamps are strictly increasing, prices are finite and positive and
/// `low <= high`. The engine only accepts bars through this type, so a
/// malformed sequence never reaches the simulation loop.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, QuantsimError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(QuantsimError::NoBars { symbol });
        }

        for (index, bar) in bars.iter().enumerate() {
            let invalid = |reason: &str| QuantsimError::InvalidBar {
                index,
                timestamp: bar.timestamp,
                reason: reason.to_string(),
            };

            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| !p.is_finite()) {
                return Err(invalid("non-finite price"));
            }
            if prices.iter().any(|&p| p <= 0.0) {
                return Err(invalid("non-positive price"));
            }
            if bar.high < bar.low {
                return Err(invalid("high below low"));
            }
            if !bar.volume.is_finite() || bar.volume < 0.0 {
                return Err(invalid("invalid volume"));
            }

            if index > 0 {
                let prev = bars[index - 1].timestamp;
                if bar.timestamp == prev {
                    return Err(invalid("duplicate timestamp"));
                }
                if bar.timestamp < prev {
                    return Err(invalid("timestamp out of order"));
                }
            }
        }

        Ok(BarSeries { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_bar(day: u32) -> Bar {
        Bar {
            timestamp: ts(day),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar(15);
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar(15);
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar(15);
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn series_accepts_increasing_timestamps() {
        let series = BarSeries::new("BTCUSDT", vec![sample_bar(1), sample_bar(2)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.symbol(), "BTCUSDT");
        assert!(!series.is_empty());
    }

    #[test]
    fn series_rejects_empty() {
        let err = BarSeries::new("BTCUSDT", vec![]).unwrap_err();
        assert!(matches!(err, QuantsimError::NoBars { .. }));
    }

    #[test]
    fn series_rejects_duplicate_timestamp() {
        let err = BarSeries::new("X", vec![sample_bar(1), sample_bar(1)]).unwrap_err();
        match err {
            QuantsimError::InvalidBar { index, reason, .. } => {
                assert_eq!(index, 1);
                assert_eq!(reason, "duplicate timestamp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn series_rejects_out_of_order() {
        let err =
            BarSeries::new("X", vec![sample_bar(1), sample_bar(3), sample_bar(2)]).unwrap_err();
        match err {
            QuantsimError::InvalidBar { index, reason, .. } => {
                assert_eq!(index, 2);
                assert_eq!(reason, "timestamp out of order");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn series_rejects_nan_close() {
        let mut bar = sample_bar(1);
        bar.close = f64::NAN;
        assert!(BarSeries::new("X", vec![bar]).is_err());
    }

    #[test]
    fn series_rejects_high_below_low() {
        let mut bar = sample_bar(1);
        bar.high = 80.0;
        assert!(BarSeries::new("X", vec![bar]).is_err());
    }
}
