//! Strategy parameters: which feed drives the signal and how it is debounced.

use std::fmt;

use serde::Serialize;

use crate::domain::debounce::{DebounceConfig, LagAnchor};
use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub name: String,
    pub indicator: IndicatorType,
    pub debounce: DebounceConfig,
}

impl Strategy {
    pub fn new(name: impl Into<String>, indicator: IndicatorType, debounce: DebounceConfig) -> Self {
        Strategy {
            name: name.into(),
            indicator,
            debounce,
        }
    }

    /// Fewest bars that can yield a single executable action.
    pub fn minimum_bars(&self) -> usize {
        let DebounceConfig {
            min_run_length,
            lag,
            anchor,
        } = self.debounce;
        let tail = match anchor {
            LagAnchor::RunStart => lag,
            LagAnchor::RunEnd => min_run_length.saturating_add(lag),
        };
        self.indicator
            .lookback()
            .saturating_add(min_run_length.max(tail).saturating_add(1))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run>{} lag={}",
            self.indicator, self.debounce.min_run_length, self.debounce.lag
        )
    }
}
