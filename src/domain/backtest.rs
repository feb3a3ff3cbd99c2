//! Single-instrument backtest pipeline.
//!
//! bars -> indicator feed -> signals -> debounced actions -> simulation -> metrics.
//! Every stage's output is kept on the result so chart and report writers can
//! consume it without recomputing anything.

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::debounce::{debounce_series, ActionKind, DebouncedActions};
use crate::domain::error::RoctraderError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_bars, OhlcvBar};
use crate::domain::signal::{classify_series, SignalSeries};
use crate::domain::simulator::{simulate, SimulationConfig, SimulationResult};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub strategy: Strategy,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub code: String,
    pub strategy: Strategy,
    pub simulation_config: SimulationConfig,
    pub indicator: IndicatorSeries,
    pub signals: SignalSeries,
    pub actions: DebouncedActions,
    pub simulation: SimulationResult,
    pub metrics: Metrics,
}

/// Run the whole pipeline over one instrument's bars.
pub fn run_backtest(
    code: &str,
    bars: &[OhlcvBar],
    config: &BacktestConfig,
) -> Result<BacktestResult, RoctraderError> {
    validate_bars(bars)?;

    let minimum = config.strategy.minimum_bars();
    if bars.len() < minimum {
        return Err(RoctraderError::InsufficientData {
            code: code.to_string(),
            bars: bars.len(),
            minimum,
        });
    }

    let indicator = config.strategy.indicator.compute(bars);
    let signals = classify_series(bars, &indicator)?;
    if signals.is_empty() {
        return Err(RoctraderError::InsufficientData {
            code: code.to_string(),
            bars: bars.len(),
            minimum,
        });
    }
    debug!(
        code,
        indicator = %config.strategy.indicator,
        warmup = signals.dropped,
        "dropped bars without indicator values"
    );

    let actions = debounce_series(&signals, &config.strategy.debounce);
    let simulation = simulate(&signals.bars, &actions.actions, &config.simulation)?;
    let metrics = Metrics::compute(&simulation);

    info!(
        code,
        strategy = %config.strategy,
        buys = actions.count(ActionKind::Buy),
        sells = actions.count(ActionKind::Sell),
        expired = actions.expired.len(),
        discarded = actions.discarded.len(),
        trades = metrics.total_trades,
        "backtest complete"
    );

    Ok(BacktestResult {
        code: code.to_string(),
        strategy: config.strategy.clone(),
        simulation_config: config.simulation,
        indicator,
        signals,
        actions,
        simulation,
        metrics,
    })
}

/// Run the pipeline and keep only the statistics.
pub fn evaluate(
    code: &str,
    bars: &[OhlcvBar],
    config: &BacktestConfig,
) -> Result<Metrics, RoctraderError> {
    run_backtest(code, bars, config).map(|result| result.metrics)
}
