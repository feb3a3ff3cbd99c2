#![allow(dead_code)]

use chrono::NaiveDate;
use roctrader::adapters::file_config_adapter::FileConfigAdapter;
use roctrader::domain::backtest::BacktestConfig;
use roctrader::domain::debounce::DebounceConfig;
use roctrader::domain::error::RoctraderError;
use roctrader::domain::indicator::IndicatorType;
pub use roctrader::domain::ohlcv::OhlcvBar;
use roctrader::domain::simulator::{PositionMode, SimulationConfig};
use roctrader::domain::sizing::SizingPolicy;
use roctrader::domain::strategy::Strategy;
use roctrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    fn check(&self, code: &str) -> Result<(), RoctraderError> {
        match self.errors.get(code) {
            Some(reason) => Err(RoctraderError::data(reason.clone())),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, RoctraderError> {
        self.check(code)?;
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|s| b.date >= s))
                    .filter(|b| end_date.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RoctraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RoctraderError> {
        self.check(code)?;
        Ok(self.data.get(code).and_then(|bars| {
            let first = bars.iter().map(|b| b.date).min()?;
            let last = bars.iter().map(|b| b.date).max()?;
            Some((first, last, bars.len()))
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(day: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: day,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10_000.0,
    }
}

/// One bar per day from 2024-01-01.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(start + chrono::Duration::days(i as i64), close))
        .collect()
}

/// Closes that alternate between `leg`-bar rises and `leg`-bar falls.
pub fn zigzag_closes(cycles: usize, leg: usize) -> Vec<f64> {
    let mut closes = vec![100.0];
    for _ in 0..cycles {
        for _ in 0..leg {
            let last = *closes.last().unwrap();
            closes.push(last + 2.0);
        }
        for _ in 0..leg {
            let last = *closes.last().unwrap();
            closes.push(last - 1.5);
        }
    }
    closes
}

pub fn roc1_config(sizing: SizingPolicy, mode: PositionMode) -> BacktestConfig {
    BacktestConfig {
        strategy: Strategy::new("roc1", IndicatorType::Roc(1), DebounceConfig::default()),
        simulation: SimulationConfig {
            initial_capital: 10_000.0,
            sizing,
            mode,
        },
    }
}

pub fn config_from(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

pub const SAMPLE_INI: &str = "\
[data]
path = /nonexistent
code = BHP

[backtest]
initial_capital = 10000
sizing = fixed_fraction
fraction = 0.5
position_mode = single

[strategy]
name = roc-one
indicator = roc
window = 1
min_run_length = 2
lag = 2

[sweep]
indicator_windows = 1, 2
min_run_lengths = 1, 2
lags = 1, 2
min_trades = 1
rank_by = total_profit
";
