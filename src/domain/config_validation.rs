//! Configuration parsing and validation.
//!
//! Every `build_*` function reads one INI section through [`ConfigPort`] and
//! returns the typed value; `validate_*` runs the same checks without keeping
//! the result. Nothing here touches price data.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::debounce::{DebounceConfig, LagAnchor, DEFAULT_LAG, DEFAULT_MIN_RUN_LENGTH};
use crate::domain::error::RoctraderError;
use crate::domain::indicator::{IndicatorType, DEFAULT_OVERBOUGHT, DEFAULT_OVERSOLD};
use crate::domain::simulator::{PositionMode, SimulationConfig, DEFAULT_INITIAL_CAPITAL};
use crate::domain::sizing::{SizingPolicy, DEFAULT_BASE_FRACTION, DEFAULT_FRACTION};
use crate::domain::strategy::Strategy;
use crate::domain::sweep::{ParamGrid, ParamSweep, RankingKey, DEFAULT_MIN_TRADES};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_WINDOW: usize = 14;
pub const MAX_FRACTION: f64 = 10.0;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RoctraderError> {
    build_simulation_config(config).map(|_| ())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RoctraderError> {
    build_strategy(config).map(|_| ())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), RoctraderError> {
    build_param_grid(config)?;
    build_param_sweep(config).map(|_| ())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RoctraderError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => return Err(missing("data", "path")),
    }
    let delimiter = match config.get_string("data", "delimiter") {
        Some(delimiter) => delimiter_byte(&delimiter).ok_or_else(|| {
            RoctraderError::invalid("data", "delimiter", "delimiter must be a single character")
        })?,
        None => b',',
    };
    if let Some(decimal) = config.get_string("data", "decimal") {
        let decimal = decimal_char(&decimal).ok_or_else(|| {
            RoctraderError::invalid("data", "decimal", "decimal must be '.' or ','")
        })?;
        check_separators(delimiter, decimal)?;
    }
    let (start, end) = date_range(config)?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(RoctraderError::invalid(
                "data",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

/// `[backtest]`: capital, sizing policy and position mode.
pub fn build_simulation_config(config: &dyn ConfigPort) -> Result<SimulationConfig, RoctraderError> {
    let initial_capital = read_f64(config, "backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL)?;
    if initial_capital <= 0.0 {
        return Err(RoctraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let sizing = match keyword(config, "backtest", "sizing").as_deref() {
        None | Some("fixed_fraction") => SizingPolicy::FixedFraction {
            fraction: read_fraction(config, "fraction", DEFAULT_FRACTION)?,
        },
        Some("anti_martingale") => SizingPolicy::AntiMartingale {
            base_fraction: read_fraction(config, "base_fraction", DEFAULT_BASE_FRACTION)?,
        },
        Some(other) => {
            return Err(RoctraderError::invalid(
                "backtest",
                "sizing",
                format!("unknown sizing '{other}', expected fixed_fraction or anti_martingale"),
            ))
        }
    };

    let mode = match keyword(config, "backtest", "position_mode").as_deref() {
        None | Some("single") => PositionMode::SinglePosition,
        Some("stacking") => PositionMode::Stacking,
        Some("stacking_fifo") => PositionMode::StackingFifo,
        Some("reversal") => PositionMode::Reversal,
        Some(other) => {
            return Err(RoctraderError::invalid(
                "backtest",
                "position_mode",
                format!(
                    "unknown position_mode '{other}', expected single, stacking, stacking_fifo or reversal"
                ),
            ))
        }
    };

    Ok(SimulationConfig {
        initial_capital,
        sizing,
        mode,
    })
}

/// `[strategy]`: indicator feed and debounce parameters.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, RoctraderError> {
    let name = config
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unnamed".to_string());

    let window = read_window(config, "window", DEFAULT_WINDOW)?;
    let smoothing = read_usize(config, "strategy", "smoothing", 0)?;

    let indicator = match keyword(config, "strategy", "indicator").as_deref() {
        None | Some("roc") if smoothing > 1 => IndicatorType::SmoothedRoc { window, smoothing },
        None | Some("roc") => IndicatorType::Roc(window),
        Some("smoothed_roc") => IndicatorType::SmoothedRoc {
            window,
            smoothing: smoothing.max(1),
        },
        Some("sma") => IndicatorType::Sma(window),
        Some("sma_spread") => {
            let fast = read_window(config, "fast", 20)?;
            let slow = read_window(config, "slow", 40)?;
            if fast >= slow {
                return Err(RoctraderError::invalid(
                    "strategy",
                    "fast",
                    "fast must be shorter than slow",
                ));
            }
            IndicatorType::SmaSpread { fast, slow }
        }
        Some("rsi") => IndicatorType::Rsi(window),
        Some("rsi_sma") => build_rsi_filter(config, window)?,
        Some(other) => {
            return Err(RoctraderError::invalid(
                "strategy",
                "indicator",
                format!(
                    "unknown indicator '{other}', expected roc, smoothed_roc, sma, sma_spread, rsi or rsi_sma"
                ),
            ))
        }
    };

    let anchor = match keyword(config, "strategy", "lag_anchor").as_deref() {
        None | Some("run_start") => LagAnchor::RunStart,
        Some("run_end") => LagAnchor::RunEnd,
        Some(other) => {
            return Err(RoctraderError::invalid(
                "strategy",
                "lag_anchor",
                format!("unknown lag_anchor '{other}', expected run_start or run_end"),
            ))
        }
    };

    let debounce = DebounceConfig {
        min_run_length: read_usize(config, "strategy", "min_run_length", DEFAULT_MIN_RUN_LENGTH)?,
        lag: read_usize(config, "strategy", "lag", DEFAULT_LAG)?,
        anchor,
    };

    Ok(Strategy::new(name, indicator, debounce))
}

/// `[sweep]` axes. Missing keys leave the axis empty.
pub fn build_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, RoctraderError> {
    let grid = ParamGrid {
        indicator_windows: read_list(config, "sweep", "indicator_windows")?,
        smoothing_windows: read_list(config, "sweep", "smoothing_windows")?,
        min_run_lengths: read_list(config, "sweep", "min_run_lengths")?,
        lags: read_list(config, "sweep", "lags")?,
        fractions: read_list(config, "sweep", "fractions")?,
    };

    if grid.indicator_windows.contains(&0) {
        return Err(RoctraderError::invalid(
            "sweep",
            "indicator_windows",
            "windows must be at least 1",
        ));
    }
    if grid
        .fractions
        .iter()
        .any(|&f| !(f > 0.0 && f <= MAX_FRACTION))
    {
        return Err(RoctraderError::invalid(
            "sweep",
            "fractions",
            format!("fractions must be in (0, {MAX_FRACTION}]"),
        ));
    }
    Ok(grid)
}

/// `[sweep]` filter and ranking settings.
pub fn build_param_sweep(config: &dyn ConfigPort) -> Result<ParamSweep, RoctraderError> {
    let min_trades = read_usize(config, "sweep", "min_trades", DEFAULT_MIN_TRADES)?;
    let ranking = match keyword(config, "sweep", "rank_by") {
        None => RankingKey::default(),
        Some(name) => RankingKey::from_name(&name).ok_or_else(|| {
            RoctraderError::invalid(
                "sweep",
                "rank_by",
                format!("unknown rank_by '{name}', expected win_loss_ratio, total_profit, sharpe or win_rate"),
            )
        })?,
    };
    Ok(ParamSweep::new()
        .with_min_trades(min_trades)
        .with_ranking(ranking)
        .with_parallelism(config.get_bool("sweep", "parallel", true)))
}

/// Optional `[data]` start/end dates.
pub fn date_range(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), RoctraderError> {
    Ok((
        read_date(config, "data", "start_date")?,
        read_date(config, "data", "end_date")?,
    ))
}

pub fn delimiter_byte(value: &str) -> Option<u8> {
    match value {
        "\\t" | "tab" => Some(b'\t'),
        "semicolon" => Some(b';'),
        _ => match value.as_bytes() {
            [b] => Some(*b),
            _ => None,
        },
    }
}

pub fn decimal_char(value: &str) -> Option<char> {
    match value.trim() {
        "." => Some('.'),
        "," => Some(','),
        _ => None,
    }
}

/// A comma decimal cannot be told apart from a comma field separator.
pub fn check_separators(delimiter: u8, decimal: char) -> Result<(), RoctraderError> {
    if char::from(delimiter) == decimal {
        return Err(RoctraderError::invalid(
            "data",
            "decimal",
            format!("decimal '{decimal}' clashes with the field delimiter; set delimiter = semicolon"),
        ));
    }
    Ok(())
}

fn missing(section: &str, key: &str) -> RoctraderError {
    RoctraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn keyword(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

fn read_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, RoctraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Ok(default),
        Some(s) => s.trim().parse().map_err(|_| {
            RoctraderError::invalid(section, key, format!("'{}' is not {expected}", s.trim()))
        }),
    }
}

/// RSI period comes from `window`; the trend legs default to SMA(50)/SMA(200).
fn build_rsi_filter(config: &dyn ConfigPort, period: usize) -> Result<IndicatorType, RoctraderError> {
    let fast = read_window(config, "fast", 50)?;
    let slow = read_window(config, "slow", 200)?;
    if fast >= slow {
        return Err(RoctraderError::invalid(
            "strategy",
            "fast",
            "fast must be shorter than slow",
        ));
    }
    let oversold = read_f64(config, "strategy", "oversold", DEFAULT_OVERSOLD)?;
    let overbought = read_f64(config, "strategy", "overbought", DEFAULT_OVERBOUGHT)?;
    for (key, value) in [("oversold", oversold), ("overbought", overbought)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(RoctraderError::invalid(
                "strategy",
                key,
                format!("{key} must lie in 0..=100"),
            ));
        }
    }
    if oversold >= overbought {
        return Err(RoctraderError::invalid(
            "strategy",
            "oversold",
            "oversold must be below overbought",
        ));
    }
    Ok(IndicatorType::RsiSmaFilter {
        period,
        fast,
        slow,
        oversold,
        overbought,
    })
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, RoctraderError> {
    read_parsed(config, section, key, default, "a non-negative integer")
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, RoctraderError> {
    let value: f64 = read_parsed(config, section, key, default, "a number")?;
    if !value.is_finite() {
        return Err(RoctraderError::invalid(section, key, "value must be finite"));
    }
    Ok(value)
}

fn read_window(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, RoctraderError> {
    let window = read_usize(config, "strategy", key, default)?;
    if window == 0 {
        return Err(RoctraderError::invalid(
            "strategy",
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(window)
}

fn read_fraction(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, RoctraderError> {
    let fraction = read_f64(config, "backtest", key, default)?;
    if fraction <= 0.0 || fraction > MAX_FRACTION {
        return Err(RoctraderError::invalid(
            "backtest",
            key,
            format!("{key} must be in (0, {MAX_FRACTION}]"),
        ));
    }
    Ok(fraction)
}

fn read_list<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<T>, RoctraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                RoctraderError::invalid(section, key, format!("invalid list entry '{s}'"))
            })
        })
        .collect()
}

fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, RoctraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                RoctraderError::invalid(
                    section,
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}
