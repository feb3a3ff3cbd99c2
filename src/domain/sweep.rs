//! Parameter grid search over the backtest pipeline.
//!
//! Every grid point runs the full pipeline against the same immutable bars
//! and produces its own row. Rows keep grid order whether they were computed
//! in parallel or sequentially; ranking is a stable sort over that order.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::backtest::{evaluate, BacktestConfig};
use crate::domain::error::RoctraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_bars, OhlcvBar};
use crate::domain::sizing::SizingPolicy;

pub const DEFAULT_MIN_TRADES: usize = 5;

/// Axes of the grid. An empty axis keeps the base configuration's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamGrid {
    pub indicator_windows: Vec<usize>,
    /// Only meaningful for rate-of-change feeds; values <= 1 mean unsmoothed.
    pub smoothing_windows: Vec<usize>,
    pub min_run_lengths: Vec<usize>,
    pub lags: Vec<usize>,
    /// Stake fraction for fixed-fraction sizing, base fraction for
    /// anti-martingale.
    pub fractions: Vec<f64>,
}

impl ParamGrid {
    /// Upper bound on the number of configurations; `generate_configs` may
    /// skip invalid combinations.
    pub fn size(&self) -> usize {
        [
            self.indicator_windows.len(),
            self.smoothing_windows.len(),
            self.min_run_lengths.len(),
            self.lags.len(),
            self.fractions.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Cartesian product of the axes applied on top of `base`.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let base_indicator = base.strategy.indicator;
        let windows = axis(&self.indicator_windows, primary_window(base_indicator));
        let smoothings = if is_roc_family(base_indicator) {
            smoothing_axis(&self.smoothing_windows, smoothing_of(base_indicator))
        } else {
            vec![0]
        };
        let min_runs = axis(&self.min_run_lengths, base.strategy.debounce.min_run_length);
        let lags = axis(&self.lags, base.strategy.debounce.lag);
        let fractions: Vec<Option<f64>> = if self.fractions.is_empty() {
            vec![None]
        } else {
            self.fractions.iter().copied().map(Some).collect()
        };

        let mut configs = Vec::with_capacity(self.size());

        for &window in &windows {
            for &smoothing in &smoothings {
                let Some(indicator) = with_window(base_indicator, window, smoothing) else {
                    continue;
                };
                for &min_run_length in &min_runs {
                    for &lag in &lags {
                        for &fraction in &fractions {
                            let mut config = base.clone();
                            config.strategy.indicator = indicator;
                            config.strategy.debounce.min_run_length = min_run_length;
                            config.strategy.debounce.lag = lag;
                            if let Some(fraction) = fraction {
                                config.simulation.sizing =
                                    with_fraction(config.simulation.sizing, fraction);
                            }
                            configs.push(config);
                        }
                    }
                }
            }
        }

        configs
    }
}

fn axis(values: &[usize], fallback: usize) -> Vec<usize> {
    if values.is_empty() {
        vec![fallback]
    } else {
        values.to_vec()
    }
}

/// Smoothing values <= 1 all mean an unsmoothed feed; collapse them so the
/// same feed is not run twice.
fn smoothing_axis(values: &[usize], fallback: usize) -> Vec<usize> {
    let mut smoothings: Vec<usize> = Vec::new();
    for smoothing in axis(values, fallback).into_iter().map(|s| s.max(1)) {
        if !smoothings.contains(&smoothing) {
            smoothings.push(smoothing);
        }
    }
    smoothings
}

fn is_roc_family(indicator: IndicatorType) -> bool {
    matches!(
        indicator,
        IndicatorType::Roc(_) | IndicatorType::SmoothedRoc { .. }
    )
}

fn primary_window(indicator: IndicatorType) -> usize {
    match indicator {
        IndicatorType::Roc(n) | IndicatorType::Sma(n) | IndicatorType::Rsi(n) => n,
        IndicatorType::SmoothedRoc { window, .. } => window,
        IndicatorType::SmaSpread { slow, .. } => slow,
        IndicatorType::RsiSmaFilter { period, .. } => period,
    }
}

fn smoothing_of(indicator: IndicatorType) -> usize {
    match indicator {
        IndicatorType::SmoothedRoc { smoothing, .. } => smoothing,
        _ => 0,
    }
}

/// Swap the swept window into the base feed. For an SMA spread the window
/// is the slow leg; combinations with `fast >= slow` are skipped. For the
/// RSI trend filter it is the RSI period.
fn with_window(base: IndicatorType, window: usize, smoothing: usize) -> Option<IndicatorType> {
    match base {
        IndicatorType::Roc(_) | IndicatorType::SmoothedRoc { .. } => Some(if smoothing > 1 {
            IndicatorType::SmoothedRoc { window, smoothing }
        } else {
            IndicatorType::Roc(window)
        }),
        IndicatorType::Sma(_) => Some(IndicatorType::Sma(window)),
        IndicatorType::Rsi(_) => Some(IndicatorType::Rsi(window)),
        IndicatorType::SmaSpread { fast, .. } if fast < window => {
            Some(IndicatorType::SmaSpread { fast, slow: window })
        }
        IndicatorType::SmaSpread { .. } => None,
        IndicatorType::RsiSmaFilter {
            fast,
            slow,
            oversold,
            overbought,
            ..
        } => Some(IndicatorType::RsiSmaFilter {
            period: window,
            fast,
            slow,
            oversold,
            overbought,
        }),
    }
}

fn with_fraction(sizing: SizingPolicy, fraction: f64) -> SizingPolicy {
    match sizing {
        SizingPolicy::FixedFraction { .. } => SizingPolicy::FixedFraction { fraction },
        SizingPolicy::AntiMartingale { .. } => SizingPolicy::AntiMartingale {
            base_fraction: fraction,
        },
    }
}

/// Statistic used to order completed configurations, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKey {
    #[default]
    WinLossRatio,
    TotalProfit,
    Sharpe,
    WinRate,
}

impl RankingKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "win_loss_ratio" => Some(RankingKey::WinLossRatio),
            "total_profit" => Some(RankingKey::TotalProfit),
            "sharpe" | "sharpe_like" => Some(RankingKey::Sharpe),
            "win_rate" => Some(RankingKey::WinRate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankingKey::WinLossRatio => "win_loss_ratio",
            RankingKey::TotalProfit => "total_profit",
            RankingKey::Sharpe => "sharpe",
            RankingKey::WinRate => "win_rate",
        }
    }

    pub fn value(&self, metrics: &Metrics) -> f64 {
        match self {
            RankingKey::WinLossRatio => metrics.win_loss_ratio,
            RankingKey::TotalProfit => metrics.total_profit,
            RankingKey::Sharpe => metrics.sharpe_like,
            RankingKey::WinRate => metrics.win_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed { metrics: Metrics },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    /// Position in grid order.
    pub index: usize,
    pub config: BacktestConfig,
    pub outcome: SweepOutcome,
}

impl SweepRow {
    pub fn metrics(&self) -> Option<&Metrics> {
        match &self.outcome {
            SweepOutcome::Completed { metrics } => Some(metrics),
            SweepOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub ranking: RankingKey,
    pub min_trades: usize,
    /// Every configuration, in grid order.
    pub rows: Vec<SweepRow>,
    /// Indices into `rows`, best first.
    pub ranked: Vec<usize>,
    pub excluded_few_trades: usize,
    pub excluded_ruined: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepRow> {
        self.ranked.first().map(|&i| &self.rows[i])
    }

    pub fn ranked_rows(&self) -> impl Iterator<Item = &SweepRow> {
        self.ranked.iter().map(|&i| &self.rows[i])
    }
}

/// Grid search executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    min_trades: usize,
    ranking: RankingKey,
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        ParamSweep::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        ParamSweep {
            min_trades: DEFAULT_MIN_TRADES,
            ranking: RankingKey::default(),
            parallel: true,
        }
    }

    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingKey) -> Self {
        self.ranking = ranking;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate every grid configuration over `bars` and rank the results.
    ///
    /// Malformed bars abort the sweep. A configuration that fails on its own
    /// (too little data for its windows, a zero entry price) is recorded as
    /// failed and left out of the ranking.
    pub fn run(
        &self,
        code: &str,
        bars: &[OhlcvBar],
        grid: &ParamGrid,
        base: &BacktestConfig,
    ) -> Result<SweepReport, RoctraderError> {
        validate_bars(bars)?;

        let configs = grid.generate_configs(base);
        info!(
            code,
            configurations = configs.len(),
            parallel = self.parallel,
            "starting sweep"
        );

        let evaluate_row = |(index, config): (usize, &BacktestConfig)| {
            let outcome = match evaluate(code, bars, config) {
                Ok(metrics) => SweepOutcome::Completed { metrics },
                Err(e) => {
                    warn!(index, strategy = %config.strategy, error = %e, "configuration failed");
                    SweepOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            SweepRow {
                index,
                config: config.clone(),
                outcome,
            }
        };

        let rows: Vec<SweepRow> = if self.parallel {
            configs.par_iter().enumerate().map(evaluate_row).collect()
        } else {
            configs.iter().enumerate().map(evaluate_row).collect()
        };

        Ok(self.rank(rows))
    }

    /// Filter and order completed rows.
    pub fn rank(&self, rows: Vec<SweepRow>) -> SweepReport {
        let mut ranked = Vec::new();
        let mut excluded_few_trades = 0usize;
        let mut excluded_ruined = 0usize;
        let mut failed = 0usize;

        for (position, row) in rows.iter().enumerate() {
            match &row.outcome {
                SweepOutcome::Failed { .. } => failed += 1,
                SweepOutcome::Completed { metrics } if metrics.ruined => excluded_ruined += 1,
                SweepOutcome::Completed { metrics } if metrics.total_trades < self.min_trades => {
                    excluded_few_trades += 1
                }
                SweepOutcome::Completed { .. } => ranked.push(position),
            }
        }

        let key = |i: &usize| rows[*i].metrics().map_or(f64::NEG_INFINITY, |m| self.ranking.value(m));
        ranked.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));

        info!(
            ranked = ranked.len(),
            excluded_few_trades,
            excluded_ruined,
            failed,
            ranking = self.ranking.name(),
            "sweep ranked"
        );

        SweepReport {
            ranking: self.ranking,
            min_trades: self.min_trades,
            rows,
            ranked,
            excluded_few_trades,
            excluded_ruined,
            failed,
        }
    }
}
