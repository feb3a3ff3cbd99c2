//! Indicator feeds consumed by the signal classifier.
//!
//! - `IndicatorPoint`: one value per bar, flagged invalid during warm-up
//! - `IndicatorType`: which feed and its windows
//! - `IndicatorSeries`: a feed aligned 1:1 with the bar series

pub mod roc;
pub mod rsi;
pub mod sma;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn invalid(date: NaiveDate) -> Self {
        IndicatorPoint {
            date,
            valid: false,
            value: 0.0,
        }
    }

    /// The value, or `None` during warm-up.
    pub fn get(&self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

pub const DEFAULT_OVERSOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum IndicatorType {
    Roc(usize),
    SmoothedRoc { window: usize, smoothing: usize },
    /// Close minus its SMA: positive while price trades above the average.
    Sma(usize),
    SmaSpread { fast: usize, slow: usize },
    /// 50 minus RSI: positive when oversold, negative when overbought.
    Rsi(usize),
    /// Mean reversion gated by trend: +1 when RSI is below `oversold` while
    /// SMA(fast) is above SMA(slow), -1 when RSI is above `overbought` while
    /// SMA(fast) is below SMA(slow), 0 otherwise.
    RsiSmaFilter {
        period: usize,
        fast: usize,
        slow: usize,
        oversold: f64,
        overbought: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Number of leading bars without a computed value.
    pub fn warmup_len(&self) -> usize {
        self.values.iter().take_while(|p| !p.valid).count()
    }
}

impl IndicatorType {
    /// Leading bars consumed before the first valid point.
    pub fn lookback(&self) -> usize {
        match *self {
            IndicatorType::Roc(window) | IndicatorType::Rsi(window) => window,
            IndicatorType::SmoothedRoc { window, smoothing } => {
                window + smoothing.saturating_sub(1)
            }
            IndicatorType::Sma(period) => period.saturating_sub(1),
            IndicatorType::SmaSpread { fast, slow } => fast.max(slow).saturating_sub(1),
            IndicatorType::RsiSmaFilter {
                period, fast, slow, ..
            } => period.max(fast.max(slow).saturating_sub(1)),
        }
    }

    /// Compute this feed over the closing prices of `bars`.
    pub fn compute(&self, bars: &[OhlcvBar]) -> IndicatorSeries {
        match *self {
            IndicatorType::Roc(window) => roc::calculate_roc(bars, window),
            IndicatorType::SmoothedRoc { window, smoothing } => {
                let raw = roc::calculate_roc(bars, window);
                if smoothing <= 1 {
                    return IndicatorSeries {
                        indicator_type: *self,
                        values: raw.values,
                    };
                }
                sma::smooth(&raw, smoothing, *self)
            }
            IndicatorType::Sma(period) => {
                let mut series = sma::calculate_sma(bars, period);
                for (point, bar) in series.values.iter_mut().zip(bars) {
                    if point.valid {
                        point.value = bar.close - point.value;
                    }
                }
                series
            }
            IndicatorType::SmaSpread { fast, slow } => IndicatorSeries {
                indicator_type: *self,
                values: sma_spread(bars, fast, slow),
            },
            IndicatorType::Rsi(period) => {
                let mut series = rsi::calculate_rsi(bars, period);
                for point in series.values.iter_mut().filter(|p| p.valid) {
                    point.value = 50.0 - point.value;
                }
                series
            }
            IndicatorType::RsiSmaFilter {
                period,
                fast,
                slow,
                oversold,
                overbought,
            } => {
                let strength = rsi::calculate_rsi(bars, period);
                let values = strength
                    .values
                    .iter()
                    .zip(sma_spread(bars, fast, slow))
                    .map(|(r, spread)| match (r.get(), spread.get()) {
                        (Some(level), Some(trend)) => {
                            let value = if level < oversold && trend > 0.0 {
                                1.0
                            } else if level > overbought && trend < 0.0 {
                                -1.0
                            } else {
                                0.0
                            };
                            IndicatorPoint {
                                date: r.date,
                                valid: true,
                                value,
                            }
                        }
                        _ => IndicatorPoint::invalid(r.date),
                    })
                    .collect();
                IndicatorSeries {
                    indicator_type: *self,
                    values,
                }
            }
        }
    }
}

/// SMA(fast) - SMA(slow), valid where both averages are.
fn sma_spread(bars: &[OhlcvBar], fast: usize, slow: usize) -> Vec<IndicatorPoint> {
    let fast_sma = sma::calculate_sma(bars, fast);
    let slow_sma = sma::calculate_sma(bars, slow);
    fast_sma
        .values
        .iter()
        .zip(&slow_sma.values)
        .map(|(f, s)| match (f.get(), s.get()) {
            (Some(fv), Some(sv)) => IndicatorPoint {
                date: f.date,
                valid: true,
                value: fv - sv,
            },
            _ => IndicatorPoint::invalid(f.date),
        })
        .collect()
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Roc(window) => write!(f, "ROC({})", window),
            IndicatorType::SmoothedRoc { window, smoothing } => {
                write!(f, "SMA(ROC({}),{})", window, smoothing)
            }
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::SmaSpread { fast, slow } => write!(f, "SMA({})-SMA({})", fast, slow),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::RsiSmaFilter {
                period,
                fast,
                slow,
                oversold,
                overbought,
            } => write!(
                f,
                "RSI({})<{}|>{} SMA({})/SMA({})",
                period, oversold, overbought, fast, slow
            ),
        }
    }
}
