//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestEngine, BacktestResult};
use crate::domain::config_validation::{RunConfig, load_run_config};
use crate::domain::error::QuantsimError;
use crate::domain::execution::StopRule;
use crate::domain::ohlcv::BarSeries;
use crate::domain::signal::{PrecomputedSignals, SignalSource};
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::{ParamSweep, fraction_grid};
use crate::logging::init_tracing;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{ReportPort, SweepEntry};

#[derive(Parser, Debug)]
#[command(name = "quantsim", about = "Bar-by-bar strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// OHLCV bars as CSV
        #[arg(short, long)]
        data: PathBuf,
        /// Precomputed scores as CSV (overrides [signals] path)
        #[arg(short, long)]
        signals: Option<PathBuf>,
        /// Directory for trades.csv, equity.csv and summary.json
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Validate config and inputs without simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run one backtest per position fraction
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        signals: Option<PathBuf>,
        /// Comma-separated list, e.g. 0.1,0.25,0.5
        #[arg(long, value_delimiter = ',', required = true)]
        fractions: Vec<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            signals,
            output,
            symbol,
            dry_run,
        } => run_backtest(
            &config,
            &data,
            signals.as_deref(),
            output.as_deref(),
            symbol.as_deref(),
            dry_run,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            data,
            signals,
            fractions,
            output,
            symbol,
        } => run_sweep(
            &config,
            &data,
            signals.as_deref(),
            &fractions,
            output.as_deref(),
            symbol.as_deref(),
        ),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Load, validate and install logging in one step.
pub fn load_config(path: &Path) -> Result<RunConfig, QuantsimError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    let run_config = load_run_config(&adapter)?;
    if let Err(e) = init_tracing(&run_config.logging) {
        eprintln!("warning: {e}");
    }
    Ok(run_config)
}

fn resolve_symbol(cli_symbol: Option<&str>, run_config: &RunConfig, data: &Path) -> String {
    cli_symbol
        .map(str::to_string)
        .or_else(|| run_config.symbol.clone())
        .or_else(|| {
            data.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Bars plus the configured signal source, aligned and ready to run.
pub fn load_inputs(
    data_port: &dyn DataPort,
    run_config: &RunConfig,
    data: &Path,
    signals: Option<&Path>,
    symbol: &str,
) -> Result<(BarSeries, Box<dyn SignalSource>), QuantsimError> {
    eprintln!("Loading bars from {}", data.display());
    let series = data_port.load_bars(data, symbol)?;

    let source: Box<dyn SignalSource> = match &run_config.strategy {
        StrategyConfig::Precomputed { thresholds } => {
            let path = signals
                .map(Path::to_path_buf)
                .or_else(|| run_config.signals_path.clone())
                .ok_or_else(|| QuantsimError::ConfigMissing {
                    section: "signals".to_string(),
                    key: "path".to_string(),
                })?;
            eprintln!("Loading signals from {}", path.display());
            let rows = data_port.load_signals(&path)?;
            Box::new(PrecomputedSignals::aligned(&series, &rows, *thresholds)?)
        }
        StrategyConfig::TrendFollowing(trend) => Box::new(trend.clone()),
        StrategyConfig::Grid(grid) => Box::new(grid.clone()),
    };
    Ok((series, source))
}

fn run_backtest(
    config_path: &Path,
    data: &Path,
    signals: Option<&Path>,
    output: Option<&Path>,
    symbol: Option<&str>,
    dry_run: bool,
) -> Result<(), QuantsimError> {
    let run_config = load_config(config_path)?;
    let symbol = resolve_symbol(symbol, &run_config, data);
    let (series, source) = load_inputs(&CsvAdapter::new(), &run_config, data, signals, &symbol)?;

    if dry_run {
        print_config(&run_config);
        eprintln!(
            "\nDry run: {} bars for {} from {} to {}, nothing simulated",
            series.len(),
            series.symbol(),
            series.bars()[0].timestamp,
            series.bars()[series.len() - 1].timestamp
        );
        return Ok(());
    }

    eprintln!(
        "Running {} on {} ({} bars)",
        source.name(),
        series.symbol(),
        series.len()
    );
    let mut engine = BacktestEngine::new(run_config.backtest.clone())?;
    let result = engine.run(&series, source.as_ref())?;
    print_summary(&result);

    if let Some(dir) = output {
        CsvReportAdapter::new().write(&result, dir)?;
        eprintln!("\nReport written to: {}", dir.display());
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), QuantsimError> {
    let run_config = load_config(config_path)?;
    eprintln!("Config validated successfully");
    print_config(&run_config);
    Ok(())
}

fn run_sweep(
    config_path: &Path,
    data: &Path,
    signals: Option<&Path>,
    fractions: &[f64],
    output: Option<&Path>,
    symbol: Option<&str>,
) -> Result<(), QuantsimError> {
    let run_config = load_config(config_path)?;
    let symbol = resolve_symbol(symbol, &run_config, data);
    let (series, source) = load_inputs(&CsvAdapter::new(), &run_config, data, signals, &symbol)?;

    let configs = fraction_grid(&run_config.backtest, fractions);
    eprintln!("Sweeping {} position fractions on {}", configs.len(), series.symbol());
    let results = ParamSweep::new()
        .with_parallelism(run_config.parallel_sweep)
        .run(&configs, &series, source.as_ref())?;

    eprintln!(
        "\n{:>10} {:>12} {:>10} {:>8} {:>10} {:>7}",
        "fraction", "final", "return", "sharpe", "max_dd", "trades"
    );
    for (fraction, result) in fractions.iter().zip(&results) {
        let m = &result.metrics;
        eprintln!(
            "{:>10} {:>12.2} {:>9.2}% {:>8} {:>9.2}% {:>7}",
            fraction,
            m.final_equity,
            m.total_return * 100.0,
            format_optional(m.sharpe_ratio),
            m.max_drawdown * 100.0,
            m.trade_count
        );
    }

    if let Some(dir) = output {
        let entries: Vec<SweepEntry<'_>> = fractions
            .iter()
            .zip(&results)
            .map(|(fraction, result)| SweepEntry {
                label: format!("fraction_{fraction}"),
                result,
            })
            .collect();
        CsvReportAdapter::new().write_sweep(&entries, dir)?;
        eprintln!("\nSweep reports written to: {}", dir.display());
    }
    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn print_config(run_config: &RunConfig) {
    let bt = &run_config.backtest;
    eprintln!("\nBacktest:");
    eprintln!("  initial_capital: {:.2}", bt.initial_capital);
    eprintln!("  commission:      {}", bt.execution.commission);
    eprintln!("  slippage:        {}", bt.execution.slippage);
    eprintln!("  sizing:          {}", bt.sizing);
    eprintln!("  max_position:    {}", bt.risk.max_position_fraction);
    eprintln!("  risk_per_trade:  {}", bt.risk.risk_per_trade);
    match bt.stops {
        StopRule::None => eprintln!("  stops:           none"),
        StopRule::Percent {
            stop_loss,
            take_profit,
        } => eprintln!(
            "  stops:           percent (stop {}, target {})",
            format_optional(stop_loss),
            format_optional(take_profit)
        ),
        StopRule::Atr {
            period,
            stop_multiplier,
            take_profit_multiplier,
        } => eprintln!(
            "  stops:           atr({period}) x{stop_multiplier} / x{take_profit_multiplier}"
        ),
    }
    if let Some(dd) = bt.max_drawdown {
        eprintln!("  max_drawdown:    {dd}");
    }
    eprintln!("Strategy: {}", run_config.strategy.name());
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.symbol);
    eprintln!("Final Equity:      {:.2}", m.final_equity);
    eprintln!("Total Return:      {:.2}%", m.total_return * 100.0);
    match m.annualized_return {
        Some(r) => eprintln!("Annualized Return: {:.2}%", r * 100.0),
        None => eprintln!("Annualized Return: n/a"),
    }
    eprintln!("Sharpe Ratio:      {}", format_optional(m.sharpe_ratio));
    eprintln!("Max Drawdown:      {:.2}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:      {}", m.trade_count);
    eprintln!("Win Rate:          {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:     {}", m.profit_factor);
    if m.trade_count > 0 {
        eprintln!("Avg Win / Loss:    {:.2} / {:.2}", m.avg_win, m.avg_loss);
        eprintln!("Largest Win/Loss:  {:.2} / {:.2}", m.largest_win, m.largest_loss);
    }
    if let Some(pos) = &result.open_position {
        eprintln!(
            "Open Position:     {:.4} @ {:.2} (not closed)",
            pos.quantity, pos.entry_price
        );
    }
}
