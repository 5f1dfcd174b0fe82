//! Backtest engine and event loop.
//!
//! The engine is a two-state machine (flat or long) driven one bar at a time.
//! Each bar runs the same fixed sequence: protective exits on the bar's
//! extremes, signal exit, signal entry, then an equity mark at the close.
//! Signal sources only ever see `bars[..=i]`.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::QuantsimError;
use super::execution::{
    ExecutionConfig, StopRule, apply_slippage_entry, apply_slippage_exit, entry_cost,
    exit_revenue, realized_pnl,
};
use super::metrics::{Metrics, period_returns};
use super::ohlcv::{Bar, BarSeries};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Position, Trade, TradeSide};
use super::risk::{EntryProposal, RiskDecision, RiskLimits, RiskManager};
use super::signal::{Signal, SignalSource};
use super::sizing::{PositionSizer, RiskParameters, SizingMethod};

/// An entry whose cost overshoots cash by less than this relative amount is
/// still taken; `cash / price * price` does not always round back to `cash`.
const CASH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub sizing: SizingMethod,
    pub risk: RiskParameters,
    pub stops: StopRule,
    pub max_drawdown: Option<f64>,
    pub max_correlation: Option<f64>,
    pub var_window: usize,
    pub var_confidence: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            execution: ExecutionConfig::default(),
            sizing: SizingMethod::FixedFraction,
            risk: RiskParameters::default(),
            stops: StopRule::None,
            max_drawdown: None,
            max_correlation: None,
            var_window: 20,
            var_confidence: 0.95,
        }
    }
}

fn in_unit_interval(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), QuantsimError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(QuantsimError::invalid(
                "backtest",
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        let commission = self.execution.commission;
        if !(0.0..1.0).contains(&commission) {
            return Err(QuantsimError::invalid(
                "backtest",
                "commission",
                format!("must be in [0, 1), got {commission}"),
            ));
        }
        let slippage = self.execution.slippage;
        if !slippage.is_finite() || slippage < 0.0 {
            return Err(QuantsimError::invalid(
                "backtest",
                "slippage",
                format!("must be >= 0, got {slippage}"),
            ));
        }
        if !in_unit_interval(self.risk.max_position_fraction) {
            return Err(QuantsimError::invalid(
                "sizing",
                "max_position_fraction",
                format!("must be in (0, 1], got {}", self.risk.max_position_fraction),
            ));
        }
        if !in_unit_interval(self.risk.risk_per_trade) {
            return Err(QuantsimError::invalid(
                "sizing",
                "risk_per_trade",
                format!("must be in (0, 1], got {}", self.risk.risk_per_trade),
            ));
        }
        if let Some(dd) = self.max_drawdown {
            if !in_unit_interval(dd) {
                return Err(QuantsimError::invalid(
                    "risk",
                    "max_drawdown",
                    format!("must be in (0, 1], got {dd}"),
                ));
            }
        }
        if let Some(corr) = self.max_correlation {
            if !in_unit_interval(corr) {
                return Err(QuantsimError::invalid(
                    "risk",
                    "max_correlation",
                    format!("must be in (0, 1], got {corr}"),
                ));
            }
        }
        if self.var_window < 2 {
            return Err(QuantsimError::invalid(
                "risk",
                "var_window",
                format!("must be at least 2, got {}", self.var_window),
            ));
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err(QuantsimError::invalid(
                "risk",
                "var_confidence",
                format!("must be in (0, 1), got {}", self.var_confidence),
            ));
        }
        self.validate_stops()
    }

    fn validate_stops(&self) -> Result<(), QuantsimError> {
        match self.stops {
            StopRule::None => Ok(()),
            StopRule::Percent {
                stop_loss,
                take_profit,
            } => {
                if let Some(sl) = stop_loss {
                    if !(sl > 0.0 && sl < 1.0) {
                        return Err(QuantsimError::invalid(
                            "stops",
                            "stop_loss",
                            format!("must be in (0, 1), got {sl}"),
                        ));
                    }
                }
                if let Some(tp) = take_profit {
                    if !tp.is_finite() || tp <= 0.0 {
                        return Err(QuantsimError::invalid(
                            "stops",
                            "take_profit",
                            format!("must be positive, got {tp}"),
                        ));
                    }
                }
                Ok(())
            }
            StopRule::Atr {
                period,
                stop_multiplier,
                take_profit_multiplier,
            } => {
                if period == 0 {
                    return Err(QuantsimError::invalid("stops", "atr_period", "must be > 0"));
                }
                if !stop_multiplier.is_finite() || stop_multiplier <= 0.0 {
                    return Err(QuantsimError::invalid(
                        "stops",
                        "stop_multiplier",
                        format!("must be positive, got {stop_multiplier}"),
                    ));
                }
                if !take_profit_multiplier.is_finite() || take_profit_multiplier <= 0.0 {
                    return Err(QuantsimError::invalid(
                        "stops",
                        "take_profit_multiplier",
                        format!("must be positive, got {take_profit_multiplier}"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            max_position_fraction: self.risk.max_position_fraction,
            max_drawdown: self.max_drawdown,
            max_correlation: self.max_correlation,
            var_window: self.var_window,
            var_confidence: self.var_confidence,
        }
    }
}

/// Outcome of one run. `open_position` is marked to the last close but never
/// counted as a completed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub initial_capital: f64,
    #[serde(flatten)]
    pub metrics: Metrics,
    /// Historical VaR of per-bar returns; `None` on runs shorter than the window.
    pub value_at_risk: Option<f64>,
    pub bars_processed: usize,
    pub cancelled: bool,
    pub open_position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.metrics.final_equity
    }

    pub fn trade_count(&self) -> usize {
        self.metrics.trade_count
    }
}

#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    sizer: PositionSizer,
    risk: RiskManager,
    portfolio: Portfolio,
    peak_equity: f64,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, QuantsimError> {
        config.validate()?;
        Ok(BacktestEngine {
            sizer: PositionSizer::new(config.sizing, config.risk),
            risk: RiskManager::new(config.risk_limits()),
            portfolio: Portfolio::new(config.initial_capital),
            peak_equity: config.initial_capital,
            config,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn reset(&mut self) {
        self.portfolio.reset();
        self.peak_equity = self.config.initial_capital;
    }

    pub fn run(
        &mut self,
        series: &BarSeries,
        source: &dyn SignalSource,
    ) -> Result<BacktestResult, QuantsimError> {
        let never = AtomicBool::new(false);
        self.run_with_cancel(series, source, &never)
    }

    /// Like [`run`](Self::run), but stops at the next bar boundary once
    /// `cancel` is set. The partial result is flagged `cancelled`.
    pub fn run_with_cancel(
        &mut self,
        series: &BarSeries,
        source: &dyn SignalSource,
        cancel: &AtomicBool,
    ) -> Result<BacktestResult, QuantsimError> {
        if let Some(expected) = source.expected_len() {
            if expected != series.len() {
                return Err(QuantsimError::SignalLengthMismatch {
                    bars: series.len(),
                    signals: expected,
                });
            }
        }

        self.reset();
        let bars = series.bars();
        let mut bars_processed = 0;
        let mut cancelled = false;

        for i in 0..bars.len() {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                debug!(bar = i, "run cancelled");
                break;
            }
            self.step(series.symbol(), &bars[..=i], source);
            bars_processed += 1;
        }

        let metrics = Metrics::compute(
            &self.portfolio.equity_curve,
            &self.portfolio.trades,
            self.config.initial_capital,
        );
        let value_at_risk = self
            .risk
            .trailing_var(&period_returns(&self.portfolio.equity_curve));

        info!(
            symbol = series.symbol(),
            strategy = source.name(),
            bars = bars_processed,
            trades = metrics.trade_count,
            final_equity = metrics.final_equity,
            total_return = metrics.total_return,
            cancelled,
            "backtest complete"
        );

        Ok(BacktestResult {
            symbol: series.symbol().to_string(),
            strategy: source.name().to_string(),
            initial_capital: self.config.initial_capital,
            metrics,
            value_at_risk,
            bars_processed,
            cancelled,
            open_position: self.portfolio.position.clone(),
            trades: self.portfolio.trades.clone(),
            equity_curve: self.portfolio.equity_curve.clone(),
        })
    }

    /// One bar; `history` ends with the current bar.
    fn step(&mut self, symbol: &str, history: &[Bar], source: &dyn SignalSource) {
        let Some(bar) = history.last() else {
            return;
        };

        if let Some((price, reason)) = self.protective_exit(bar) {
            self.close_position(bar, price, reason);
        }

        let signal = source.signal(history);

        if signal == Signal::Sell && !self.portfolio.is_flat() {
            let price = apply_slippage_exit(bar.close, self.config.execution.slippage);
            self.close_position(bar, price, ExitReason::Signal);
        }

        if signal == Signal::Buy && self.portfolio.is_flat() {
            self.try_enter(symbol, history, source);
        }

        let equity = self.portfolio.record_equity(bar.timestamp, bar.close).equity;
        self.peak_equity = self.peak_equity.max(equity);
    }

    /// Stop-loss wins when both levels are inside the bar's range. Fills are
    /// at the level itself, also when the bar gaps through it.
    fn protective_exit(&self, bar: &Bar) -> Option<(f64, ExitReason)> {
        let position = self.portfolio.position.as_ref()?;
        if position.should_stop_loss(bar.low) {
            return position.stop_loss.map(|p| (p, ExitReason::StopLoss));
        }
        if position.should_take_profit(bar.high) {
            return position.take_profit.map(|p| (p, ExitReason::TakeProfit));
        }
        None
    }

    fn close_position(&mut self, bar: &Bar, price: f64, reason: ExitReason) {
        let Some(position) = self.portfolio.position.take() else {
            return;
        };
        let commission = self.config.execution.commission;
        let revenue = exit_revenue(position.quantity, price, commission);
        let pnl = realized_pnl(position.quantity, position.entry_price, price, commission);
        self.portfolio.cash += revenue;

        debug!(
            timestamp = %bar.timestamp,
            price,
            quantity = position.quantity,
            pnl,
            reason = %reason,
            "exit"
        );

        self.portfolio.record_trade(Trade {
            timestamp: bar.timestamp,
            side: TradeSide::Sell,
            price,
            quantity: position.quantity,
            amount: revenue,
            pnl: Some(pnl),
            exit_reason: Some(reason),
        });
    }

    fn try_enter(&mut self, symbol: &str, history: &[Bar], source: &dyn SignalSource) {
        let Some(bar) = history.last() else {
            return;
        };
        let execution = self.config.execution;
        let price = apply_slippage_entry(bar.close, execution.slippage);
        let levels = self.config.stops.levels(price, history);
        let cash = self.portfolio.cash;

        let quantity = match self.sizer.quantity(
            price,
            cash,
            source.volatility(history),
            levels.stop_distance(price),
        ) {
            Ok(q) if q > 0.0 => q,
            Ok(_) => {
                debug!(timestamp = %bar.timestamp, "entry skipped: zero quantity");
                return;
            }
            Err(e) => {
                debug!(timestamp = %bar.timestamp, error = %e, "entry skipped: invalid sizing");
                return;
            }
        };

        let account_value = self.portfolio.total_equity(bar.close);
        let proposal = EntryProposal {
            position_value: quantity * price,
            open_position_value: self.portfolio.position_value(bar.close),
            account_value,
            peak_equity: self.peak_equity.max(account_value),
        };
        if let RiskDecision::Rejected(reason) = self.risk.check_entry(&proposal) {
            debug!(timestamp = %bar.timestamp, reason = %reason, "entry skipped: risk limit");
            return;
        }

        let cost = entry_cost(quantity, price, execution.commission);
        if cost > cash * (1.0 + CASH_TOLERANCE) {
            debug!(timestamp = %bar.timestamp, cost, cash, "entry skipped: insufficient cash");
            return;
        }

        self.portfolio.cash -= cost;
        self.portfolio.position = Some(Position {
            symbol: symbol.to_string(),
            quantity,
            entry_price: price,
            entry_timestamp: bar.timestamp,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
        });

        debug!(timestamp = %bar.timestamp, price, quantity, cost, "entry");

        self.portfolio.record_trade(Trade {
            timestamp: bar.timestamp,
            side: TradeSide::Buy,
            price,
            quantity,
            amount: cost,
            pnl: None,
            exit_reason: None,
        });
    }
}
