//! OHLCV bar representation and series validation.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::RoctraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Check that a loaded series is usable: non-empty, strictly increasing
/// dates and finite prices. Runs before any signal processing.
pub fn validate_bars(bars: &[OhlcvBar]) -> Result<(), RoctraderError> {
    if bars.is_empty() {
        return Err(RoctraderError::data("price series is empty"));
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if prices.iter().any(|v| !v.is_finite()) {
            return Err(RoctraderError::data(format!(
                "non-finite value in bar {} ({})",
                i, bar.date
            )));
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(RoctraderError::data(format!(
                "dates not strictly increasing at bar {}: {} follows {}",
                i,
                bar.date,
                bars[i - 1].date
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 10.0,
            low: close - 10.0,
            close,
            volume: 50_000.0,
        }
    }

    #[test]
    fn validate_accepts_ordered_series() {
        let bars = vec![bar(1, 100.0), bar(2, 101.0), bar(4, 99.0)];
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn validate_rejects_empty() {
        let err = validate_bars(&[]).unwrap_err();
        assert!(matches!(err, RoctraderError::Data { .. }));
    }

    #[test]
    fn validate_rejects_duplicate_dates() {
        let bars = vec![bar(1, 100.0), bar(1, 101.0)];
        assert!(matches!(
            validate_bars(&bars),
            Err(RoctraderError::Data { .. })
        ));
    }

    #[test]
    fn validate_rejects_unsorted() {
        let bars = vec![bar(3, 100.0), bar(2, 101.0)];
        assert!(validate_bars(&bars).is_err());
    }

    #[test]
    fn validate_rejects_nan_close() {
        let bars = vec![bar(1, 100.0), bar(2, f64::NAN)];
        assert!(validate_bars(&bars).is_err());
    }
}
