//! Tracing subscriber setup for the binary.
//!
//! The library only emits events; installing a subscriber is the caller's job.

use crate::domain::config_validation::{LogFormat, LoggingConfig};

pub const LOG_ENV_VAR: &str = "QUANTSIM_LOG";

/// `QUANTSIM_LOG` overrides the configured level. A second call is a no-op.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| config.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // try_init fails only when a global subscriber is already installed
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        if std::env::var(LOG_ENV_VAR).is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "quantsim=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn repeated_init_is_harmless() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        if std::env::var(LOG_ENV_VAR).is_ok() {
            return;
        }
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }
}
