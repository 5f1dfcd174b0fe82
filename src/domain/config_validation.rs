//! Configuration loading and validation.
//!
//! Turns INI sections into typed domain configuration, failing on the first
//! missing or invalid field before any run starts.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::QuantsimError;
use crate::domain::execution::{ExecutionConfig, StopRule};
use crate::domain::signal::SignalThresholds;
use crate::domain::sizing::{RiskParameters, SizingMethod};
use crate::domain::strategy::{GridTrading, StrategyConfig, TrendFollowing};
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Everything a CLI run needs from one config file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub symbol: Option<String>,
    /// Score file for the precomputed strategy; the CLI flag takes precedence.
    pub signals_path: Option<PathBuf>,
    pub backtest: BacktestConfig,
    pub strategy: StrategyConfig,
    pub parallel_sweep: bool,
    pub logging: LoggingConfig,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, QuantsimError> {
    Ok(RunConfig {
        symbol: config.get_string("backtest", "symbol"),
        signals_path: config.get_string("signals", "path").map(PathBuf::from),
        backtest: load_backtest_config(config)?,
        strategy: load_strategy_config(config)?,
        parallel_sweep: config.get_bool("sweep", "parallel")?.unwrap_or(true),
        logging: load_logging_config(config)?,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, QuantsimError> {
    let defaults = BacktestConfig::default();
    let initial_capital = required_double(config, "backtest", "initial_capital")?;

    let execution = ExecutionConfig {
        commission: double_or(config, "backtest", "commission", defaults.execution.commission)?,
        slippage: double_or(config, "backtest", "slippage", defaults.execution.slippage)?,
    };

    let sizing = match config.get_string("sizing", "method") {
        None => defaults.sizing,
        Some(name) => name
            .parse::<SizingMethod>()
            .map_err(|reason| QuantsimError::invalid("sizing", "method", reason))?,
    };

    let risk = RiskParameters {
        max_position_fraction: double_or(
            config,
            "sizing",
            "max_position_fraction",
            defaults.risk.max_position_fraction,
        )?,
        risk_per_trade: double_or(config, "sizing", "risk_per_trade", defaults.risk.risk_per_trade)?,
    };

    let backtest = BacktestConfig {
        initial_capital,
        execution,
        sizing,
        risk,
        stops: load_stop_rule(config)?,
        max_drawdown: config.get_double("risk", "max_drawdown")?,
        max_correlation: config.get_double("risk", "max_correlation")?,
        var_window: usize_or(config, "risk", "var_window", defaults.var_window)?,
        var_confidence: double_or(config, "risk", "var_confidence", defaults.var_confidence)?,
    };
    backtest.validate()?;
    Ok(backtest)
}

fn load_stop_rule(config: &dyn ConfigPort) -> Result<StopRule, QuantsimError> {
    let mode = config
        .get_string("stops", "mode")
        .unwrap_or_else(|| "none".to_string());
    match mode.to_lowercase().as_str() {
        "none" => Ok(StopRule::None),
        "percent" => {
            let stop_loss = config.get_double("stops", "stop_loss")?;
            let take_profit = config.get_double("stops", "take_profit")?;
            if stop_loss.is_none() && take_profit.is_none() {
                return Err(QuantsimError::ConfigMissing {
                    section: "stops".to_string(),
                    key: "stop_loss".to_string(),
                });
            }
            Ok(StopRule::Percent {
                stop_loss,
                take_profit,
            })
        }
        "atr" => Ok(StopRule::Atr {
            period: usize_or(config, "stops", "atr_period", 14)?,
            stop_multiplier: double_or(config, "stops", "stop_multiplier", 2.0)?,
            take_profit_multiplier: double_or(config, "stops", "take_profit_multiplier", 4.0)?,
        }),
        other => Err(QuantsimError::invalid(
            "stops",
            "mode",
            format!("unknown stop mode '{other}' (expected none, percent or atr)"),
        )),
    }
}

pub fn load_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, QuantsimError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "precomputed".to_string());

    match name.to_lowercase().as_str() {
        "precomputed" => Ok(StrategyConfig::Precomputed {
            thresholds: load_thresholds(config)?,
        }),
        "trend_following" => {
            let d = TrendFollowing::default();
            let trend = TrendFollowing {
                short_window: usize_or(config, "strategy", "short_window", d.short_window)?,
                long_window: usize_or(config, "strategy", "long_window", d.long_window)?,
                rsi_window: usize_or(config, "strategy", "rsi_window", d.rsi_window)?,
                rsi_overbought: double_or(config, "strategy", "rsi_overbought", d.rsi_overbought)?,
                rsi_oversold: double_or(config, "strategy", "rsi_oversold", d.rsi_oversold)?,
                volume_window: usize_or(config, "strategy", "volume_window", d.volume_window)?,
                bollinger_window: usize_or(
                    config,
                    "strategy",
                    "bollinger_window",
                    d.bollinger_window,
                )?,
                bollinger_k: double_or(config, "strategy", "bollinger_k", d.bollinger_k)?,
                atr_window: usize_or(config, "strategy", "atr_window", d.atr_window)?,
            };
            trend.validate()?;
            Ok(StrategyConfig::TrendFollowing(trend))
        }
        "grid" => {
            let grid = GridTrading::new(
                required_double(config, "strategy", "lower_price")?,
                required_double(config, "strategy", "upper_price")?,
                usize_or(config, "strategy", "grid_num", 10)?,
            )?;
            Ok(StrategyConfig::Grid(grid))
        }
        other => Err(QuantsimError::invalid(
            "strategy",
            "name",
            format!("unknown strategy '{other}' (expected precomputed, trend_following or grid)"),
        )),
    }
}

fn load_thresholds(config: &dyn ConfigPort) -> Result<SignalThresholds, QuantsimError> {
    let d = SignalThresholds::default();
    let thresholds = SignalThresholds {
        buy_above: double_or(config, "signals", "buy_threshold", d.buy_above)?,
        sell_below: double_or(config, "signals", "sell_threshold", d.sell_below)?,
    };
    if thresholds.sell_below > thresholds.buy_above {
        return Err(QuantsimError::invalid(
            "signals",
            "sell_threshold",
            "sell_threshold must not exceed buy_threshold",
        ));
    }
    Ok(thresholds)
}

fn load_logging_config(config: &dyn ConfigPort) -> Result<LoggingConfig, QuantsimError> {
    let format = match config.get_string("logging", "format") {
        None => LogFormat::Text,
        Some(f) => match f.to_lowercase().as_str() {
            "text" | "pretty" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(QuantsimError::invalid(
                    "logging",
                    "format",
                    format!("unknown log format '{other}' (expected text or json)"),
                ));
            }
        },
    };
    Ok(LoggingConfig {
        level: config
            .get_string("logging", "level")
            .unwrap_or_else(|| LoggingConfig::default().level),
        format,
    })
}

fn required_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, QuantsimError> {
    config
        .get_double(section, key)?
        .ok_or_else(|| QuantsimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn double_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuantsimError> {
    Ok(config.get_double(section, key)?.unwrap_or(default))
}

fn usize_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, QuantsimError> {
    match config.get_int(section, key)? {
        None => Ok(default),
        Some(v) => usize::try_from(v)
            .map_err(|_| QuantsimError::invalid(section, key, format!("must be >= 0, got {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<impl std::fmt::Debug, QuantsimError>, expected_key: &str) {
        match result {
            Err(QuantsimError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = make_config("[backtest]\ninitial_capital = 50000\n");
        let run = load_run_config(&config).unwrap();
        assert_eq!(run.backtest.initial_capital, 50_000.0);
        assert_eq!(run.backtest.execution, ExecutionConfig::default());
        assert_eq!(run.backtest.sizing, SizingMethod::FixedFraction);
        assert_eq!(run.backtest.stops, StopRule::None);
        assert_eq!(
            run.strategy,
            StrategyConfig::Precomputed {
                thresholds: SignalThresholds::default()
            }
        );
        assert!(run.parallel_sweep);
        assert_eq!(run.logging, LoggingConfig::default());
        assert!(run.symbol.is_none());
        assert!(run.signals_path.is_none());
    }

    #[test]
    fn full_config_round_trips_into_domain_types() {
        let config = make_config(
            r#"
[backtest]
symbol = ETHUSDT
initial_capital = 10000
commission = 0.0005
slippage = 0

[sizing]
method = risk_parity
max_position_fraction = 0.25
risk_per_trade = 0.01

[risk]
max_drawdown = 0.3

[stops]
mode = atr
atr_period = 10

[strategy]
name = trend_following
short_window = 5
long_window = 15

[signals]
path = scores.csv

[sweep]
parallel = false

[logging]
level = debug
format = json
"#,
        );
        let run = load_run_config(&config).unwrap();
        assert_eq!(run.symbol.as_deref(), Some("ETHUSDT"));
        assert_eq!(run.backtest.sizing, SizingMethod::RiskParity);
        assert_eq!(run.backtest.risk.max_position_fraction, 0.25);
        assert_eq!(run.backtest.max_drawdown, Some(0.3));
        assert_eq!(
            run.backtest.stops,
            StopRule::Atr {
                period: 10,
                stop_multiplier: 2.0,
                take_profit_multiplier: 4.0
            }
        );
        match run.strategy {
            StrategyConfig::TrendFollowing(t) => {
                assert_eq!(t.short_window, 5);
                assert_eq!(t.long_window, 15);
                assert_eq!(t.rsi_window, 14);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
        assert!(!run.parallel_sweep);
        assert_eq!(run.signals_path, Some(PathBuf::from("scores.csv")));
        assert_eq!(run.logging.format, LogFormat::Json);
        assert_eq!(run.logging.level, "debug");
    }

    #[test]
    fn missing_initial_capital_fails() {
        let config = make_config("[backtest]\ncommission = 0.001\n");
        assert!(matches!(
            load_backtest_config(&config),
            Err(QuantsimError::ConfigMissing { ref key, .. }) if key == "initial_capital"
        ));
    }

    #[test]
    fn initial_capital_zero_fails() {
        let config = make_config("[backtest]\ninitial_capital = 0\n");
        assert_invalid(load_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn commission_of_one_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\ncommission = 1.0\n");
        assert_invalid(load_backtest_config(&config), "commission");
    }

    #[test]
    fn slippage_negative_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\nslippage = -0.01\n");
        assert_invalid(load_backtest_config(&config), "slippage");
    }

    #[test]
    fn unknown_sizing_method_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\n[sizing]\nmethod = kelly\n");
        assert_invalid(load_backtest_config(&config), "method");
    }

    #[test]
    fn fraction_above_one_fails() {
        let config = make_config(
            "[backtest]\ninitial_capital = 1000\n[sizing]\nmax_position_fraction = 1.5\n",
        );
        assert_invalid(load_backtest_config(&config), "max_position_fraction");
    }

    #[test]
    fn max_correlation_out_of_range_fails() {
        let config =
            make_config("[backtest]\ninitial_capital = 1000\n[risk]\nmax_correlation = 1.2\n");
        assert_invalid(load_backtest_config(&config), "max_correlation");
    }

    #[test]
    fn var_settings_load_with_defaults() {
        let config = make_config("[backtest]\ninitial_capital = 1000\n");
        let bt = load_backtest_config(&config).unwrap();
        assert_eq!(bt.var_window, 20);
        assert_eq!(bt.var_confidence, 0.95);

        let config = make_config(
            "[backtest]\ninitial_capital = 1000\n[risk]\nvar_window = 60\nvar_confidence = 0.99\n",
        );
        let bt = load_backtest_config(&config).unwrap();
        assert_eq!(bt.var_window, 60);
        assert_eq!(bt.var_confidence, 0.99);
    }

    #[test]
    fn var_settings_out_of_range_fail() {
        let config =
            make_config("[backtest]\ninitial_capital = 1000\n[risk]\nvar_window = 1\n");
        assert_invalid(load_backtest_config(&config), "var_window");
        let config =
            make_config("[backtest]\ninitial_capital = 1000\n[risk]\nvar_confidence = 1.0\n");
        assert_invalid(load_backtest_config(&config), "var_confidence");
    }

    #[test]
    fn percent_stops_need_a_level() {
        let config = make_config("[backtest]\ninitial_capital = 1000\n[stops]\nmode = percent\n");
        assert!(matches!(
            load_backtest_config(&config),
            Err(QuantsimError::ConfigMissing { .. })
        ));

        let config = make_config(
            "[backtest]\ninitial_capital = 1000\n[stops]\nmode = percent\ntake_profit = 0.1\n",
        );
        assert_eq!(
            load_backtest_config(&config).unwrap().stops,
            StopRule::Percent {
                stop_loss: None,
                take_profit: Some(0.1)
            }
        );
    }

    #[test]
    fn unknown_stop_mode_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\n[stops]\nmode = trailing\n");
        assert_invalid(load_backtest_config(&config), "mode");
    }

    #[test]
    fn grid_strategy_requires_bounds() {
        let config = make_config("[strategy]\nname = grid\nlower_price = 90\n");
        assert!(matches!(
            load_strategy_config(&config),
            Err(QuantsimError::ConfigMissing { ref key, .. }) if key == "upper_price"
        ));

        let config = make_config("[strategy]\nname = grid\nlower_price = 90\nupper_price = 110\n");
        match load_strategy_config(&config).unwrap() {
            StrategyConfig::Grid(g) => assert_eq!(g.grid_num, 10),
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn negative_window_fails() {
        let config = make_config("[strategy]\nname = trend_following\nshort_window = -5\n");
        assert_invalid(load_strategy_config(&config), "short_window");
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = make_config("[strategy]\nname = martingale\n");
        assert_invalid(load_strategy_config(&config), "name");
    }

    #[test]
    fn inverted_thresholds_fail() {
        let config = make_config("[signals]\nbuy_threshold = 0.1\nsell_threshold = 0.5\n");
        assert_invalid(load_strategy_config(&config), "sell_threshold");
    }

    #[test]
    fn custom_thresholds_load() {
        let config = make_config("[signals]\nbuy_threshold = 0.6\nsell_threshold = 0.4\n");
        assert_eq!(
            load_strategy_config(&config).unwrap(),
            StrategyConfig::Precomputed {
                thresholds: SignalThresholds {
                    buy_above: 0.6,
                    sell_below: 0.4
                }
            }
        );
    }

    #[test]
    fn unknown_log_format_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\n[logging]\nformat = xml\n");
        assert_invalid(load_run_config(&config), "format");
    }
}
