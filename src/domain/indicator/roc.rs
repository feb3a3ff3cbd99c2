//! Rate of change over `n` bars, in percent.
//!
//! ROC(n)[i] = (C[i] / C[i-n] - 1) * 100, defined as 0 when C[i-n] == 0.
//! The first n points are warm-up; n == 0 yields no valid points.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

fn percent_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

pub fn calculate_roc(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match i.checked_sub(period) {
            Some(base) if period > 0 => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: percent_change(bars[base].close, bar.close),
            },
            _ => IndicatorPoint::invalid(bar.date),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}
