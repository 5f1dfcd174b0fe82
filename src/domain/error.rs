//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for quantsim.
#[derive(Debug, thiserror::Error)]
pub enum QuantsimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no bars for {symbol}")]
    NoBars { symbol: String },

    #[error("invalid bar at index {index} ({timestamp}): {reason}")]
    InvalidBar {
        index: usize,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("signal series has {signals} entries but bar series has {bars}")]
    SignalLengthMismatch { bars: usize, signals: usize },

    #[error("signal timestamp {signal} at index {index} does not match bar timestamp {bar}")]
    SignalMisaligned {
        index: usize,
        bar: NaiveDateTime,
        signal: NaiveDateTime,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantsimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        QuantsimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&QuantsimError> for std::process::ExitCode {
    fn from(err: &QuantsimError) -> Self {
        let code: u8 = match err {
            QuantsimError::Io(_) | QuantsimError::Report { .. } => 1,
            QuantsimError::ConfigParse { .. }
            | QuantsimError::ConfigMissing { .. }
            | QuantsimError::ConfigInvalid { .. } => 2,
            QuantsimError::Data { .. }
            | QuantsimError::NoBars { .. }
            | QuantsimError::InvalidBar { .. } => 3,
            QuantsimError::SignalLengthMismatch { .. } | QuantsimError::SignalMisaligned { .. } => {
                4
            }
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn config_invalid_message() {
        let err = QuantsimError::invalid("sizing", "max_position_fraction", "must be in (0, 1]");
        assert_eq!(
            err.to_string(),
            "invalid config value [sizing] max_position_fraction: must be in (0, 1]"
        );
    }

    #[test]
    fn invalid_bar_message_names_index() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = QuantsimError::InvalidBar {
            index: 3,
            timestamp: ts,
            reason: "duplicate timestamp".into(),
        };
        assert!(err.to_string().contains("index 3"));
        assert!(err.to_string().contains("duplicate timestamp"));
    }

    #[test]
    fn length_mismatch_message() {
        let err = QuantsimError::SignalLengthMismatch {
            bars: 5,
            signals: 4,
        };
        assert_eq!(
            err.to_string(),
            "signal series has 4 entries but bar series has 5"
        );
    }
}
