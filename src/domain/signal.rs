//! Tri-state signal classification of an indicator feed.
//!
//! value > 0 → Long, value < 0 → Short, value == 0 → Flat. Bars whose
//! indicator is undefined (warm-up or non-finite) are dropped here and never
//! reach run detection or the simulator.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::error::RoctraderError;
use super::indicator::IndicatorSeries;
use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalValue {
    Long,
    Short,
    Flat,
}

impl SignalValue {
    pub fn classify(value: Option<f64>) -> Self {
        match value {
            Some(v) if v > 0.0 => SignalValue::Long,
            Some(v) if v < 0.0 => SignalValue::Short,
            _ => SignalValue::Flat,
        }
    }

    pub fn from_i8(value: i8) -> Self {
        match value.signum() {
            1 => SignalValue::Long,
            -1 => SignalValue::Short,
            _ => SignalValue::Flat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub indicator: f64,
    pub signal: SignalValue,
}

/// Bars that survived warm-up filtering, paired index-for-index with their
/// signals. All downstream bar indices refer to this trimmed sequence.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSeries {
    pub bars: Vec<OhlcvBar>,
    pub points: Vec<SignalPoint>,
    pub dropped: usize,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn signals(&self) -> Vec<SignalValue> {
        self.points.iter().map(|p| p.signal).collect()
    }
}

/// Classify every bar with a defined indicator value.
pub fn classify_series(
    bars: &[OhlcvBar],
    series: &IndicatorSeries,
) -> Result<SignalSeries, RoctraderError> {
    if bars.len() != series.values.len() {
        return Err(RoctraderError::data(format!(
            "indicator {} has {} points for {} bars",
            series.indicator_type,
            series.values.len(),
            bars.len()
        )));
    }

    let mut kept_bars = Vec::with_capacity(bars.len());
    let mut points = Vec::with_capacity(bars.len());

    for (bar, point) in bars.iter().zip(&series.values) {
        let Some(value) = point.get().filter(|v| v.is_finite()) else {
            continue;
        };
        kept_bars.push(bar.clone());
        points.push(SignalPoint {
            date: bar.date,
            indicator: value,
            signal: SignalValue::classify(Some(value)),
        });
    }

    let dropped = bars.len() - points.len();
    debug!(
        indicator = %series.indicator_type,
        kept = points.len(),
        dropped,
        "classified signals"
    );

    Ok(SignalSeries {
        bars: kept_bars,
        points,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorPoint, IndicatorType};

    fn bar(day: u32) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        }
    }

    fn point(day: u32, valid: bool, value: f64) -> IndicatorPoint {
        IndicatorPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            valid,
            value,
        }
    }

    #[test]
    fn classify_rule() {
        assert_eq!(SignalValue::classify(Some(0.5)), SignalValue::Long);
        assert_eq!(SignalValue::classify(Some(-0.5)), SignalValue::Short);
        assert_eq!(SignalValue::classify(Some(0.0)), SignalValue::Flat);
        assert_eq!(SignalValue::classify(None), SignalValue::Flat);
    }

    #[test]
    fn from_i8_uses_sign() {
        assert_eq!(SignalValue::from_i8(1), SignalValue::Long);
        assert_eq!(SignalValue::from_i8(-3), SignalValue::Short);
        assert_eq!(SignalValue::from_i8(0), SignalValue::Flat);
    }

    #[test]
    fn warmup_bars_are_dropped() {
        let bars = vec![bar(1), bar(2), bar(3), bar(4)];
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Roc(2),
            values: vec![
                point(1, false, 0.0),
                point(2, false, 0.0),
                point(3, true, 1.5),
                point(4, true, -2.0),
            ],
        };

        let signals = classify_series(&bars, &series).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals.dropped, 2);
        assert_eq!(signals.bars[0].date, bars[2].date);
        assert_eq!(
            signals.signals(),
            vec![SignalValue::Long, SignalValue::Short]
        );
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let bars = vec![bar(1), bar(2)];
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Roc(1),
            values: vec![point(1, true, f64::NAN), point(2, true, 0.0)],
        };

        let signals = classify_series(&bars, &series).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals.points[0].signal, SignalValue::Flat);
    }

    #[test]
    fn misaligned_series_is_data_error() {
        let bars = vec![bar(1), bar(2)];
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Roc(1),
            values: vec![point(1, true, 1.0)],
        };
        assert!(matches!(
            classify_series(&bars, &series),
            Err(RoctraderError::Data { .. })
        ));
    }
}
