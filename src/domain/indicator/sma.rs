//! Simple moving average, over closing prices or over another feed.
//!
//! SMA(n)[i] = sum(x[i-j] for j in 0..n) / n
//! A point is valid only when all n inputs in its window are valid, so
//! smoothing a feed extends its warm-up by n - 1 bars.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint {
            date: b.date,
            valid: true,
            value: b.close,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(&closes, period),
    }
}

/// Smooth an existing feed, tagging the result with `indicator_type`.
pub fn smooth(
    series: &IndicatorSeries,
    period: usize,
    indicator_type: IndicatorType,
) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type,
        values: rolling_mean(&series.values, period),
    }
}

fn rolling_mean(input: &[IndicatorPoint], period: usize) -> Vec<IndicatorPoint> {
    let mut values = Vec::with_capacity(input.len());
    let mut sum = 0.0;
    let mut valid_run = 0usize;

    for (i, point) in input.iter().enumerate() {
        if point.valid {
            sum += point.value;
            valid_run += 1;
        } else {
            sum = 0.0;
            valid_run = 0;
        }

        if period > 0 && valid_run > period {
            sum -= input[i - period].value;
        }

        if period > 0 && valid_run >= period {
            values.push(IndicatorPoint {
                date: point.date,
                valid: true,
                value: sum / period as f64,
            });
        } else {
            values.push(IndicatorPoint::invalid(point.date));
        }
    }

    values
}
