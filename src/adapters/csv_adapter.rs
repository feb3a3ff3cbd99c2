//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<code>.csv`, with a header row. Columns
//! are located by name (`timestamp`, `datetime` or `date`, then `open`,
//! `high`, `low`, `close`, `volume`), so their order does not matter.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::config_validation::{check_separators, decimal_char, delimiter_byte};
use crate::domain::error::RoctraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DATE_COLUMNS: [&str; 3] = ["timestamp", "datetime", "date"];
const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub decimal: char,
    pub date_format: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            decimal: '.',
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
    format: CsvFormat,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            format: CsvFormat::default(),
        }
    }

    pub fn with_format(base_path: PathBuf, format: CsvFormat) -> Self {
        Self { base_path, format }
    }

    /// Build from the `[data]` section.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RoctraderError> {
        let base_path = config
            .get_string("data", "path")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RoctraderError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;

        let mut format = CsvFormat::default();
        if let Some(delimiter) = config.get_string("data", "delimiter") {
            format.delimiter = delimiter_byte(&delimiter).ok_or_else(|| {
                RoctraderError::invalid("data", "delimiter", "delimiter must be a single character")
            })?;
        }
        if let Some(decimal) = config.get_string("data", "decimal") {
            format.decimal = decimal_char(&decimal).ok_or_else(|| {
                RoctraderError::invalid("data", "decimal", "decimal must be '.' or ','")
            })?;
        }
        check_separators(format.delimiter, format.decimal)?;
        if let Some(date_format) = config
            .get_string("data", "date_format")
            .filter(|s| !s.trim().is_empty())
        {
            format.date_format = date_format.trim().to_string();
        }

        Ok(Self::with_format(PathBuf::from(base_path.trim()), format))
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn read_bars(&self, path: &Path) -> Result<Vec<OhlcvBar>, RoctraderError> {
        let file = File::open(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.format.delimiter)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = rdr.headers().map_err(|e| {
            RoctraderError::data(format!("{}: cannot read header: {}", path.display(), e))
        })?;
        let columns = ColumnMap::from_headers(headers, path)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let line = row + 2;
            let record = result.map_err(|e| {
                RoctraderError::data(format!("{}:{}: CSV parse error: {}", path.display(), line, e))
            })?;

            let raw_date = columns.field(&record, columns.date, line, path)?;
            let date = parse_date(raw_date, &self.format.date_format).ok_or_else(|| {
                RoctraderError::data(format!(
                    "{}:{}: invalid date '{}' for format {}",
                    path.display(),
                    line,
                    raw_date,
                    self.format.date_format
                ))
            })?;

            let mut values = [0.0_f64; 5];
            for (slot, (&index, name)) in values
                .iter_mut()
                .zip(columns.prices.iter().zip(PRICE_COLUMNS))
            {
                let raw = columns.field(&record, index, line, path)?;
                *slot = parse_number(raw, self.format.decimal).ok_or_else(|| {
                    RoctraderError::data(format!(
                        "{}:{}: invalid {} value '{}'",
                        path.display(),
                        line,
                        name,
                        raw
                    ))
                })?;
            }
            let [open, high, low, close, volume] = values;

            bars.push(OhlcvBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        debug!(path = %path.display(), bars = bars.len(), "loaded csv");
        Ok(bars)
    }
}

struct ColumnMap {
    date: usize,
    prices: [usize; 5],
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self, RoctraderError> {
        let lookup: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();

        let date = DATE_COLUMNS
            .iter()
            .find_map(|name| lookup.get(*name).copied())
            .ok_or_else(|| {
                RoctraderError::data(format!(
                    "{}: missing timestamp/datetime column",
                    path.display()
                ))
            })?;

        let mut prices = [0usize; 5];
        for (slot, name) in prices.iter_mut().zip(PRICE_COLUMNS) {
            *slot = *lookup.get(name).ok_or_else(|| {
                RoctraderError::data(format!("{}: missing {} column", path.display(), name))
            })?;
        }

        Ok(Self { date, prices })
    }

    fn field<'r>(
        &self,
        record: &'r csv::StringRecord,
        index: usize,
        line: usize,
        path: &Path,
    ) -> Result<&'r str, RoctraderError> {
        record.get(index).ok_or_else(|| {
            RoctraderError::data(format!("{}:{}: row is too short", path.display(), line))
        })
    }
}

/// Parse a date, falling back to a date-time with the same format and then to
/// the part before the first whitespace (a trailing time of day is ignored).
fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            let day = raw.split_whitespace().next()?;
            NaiveDate::parse_from_str(day, format).ok()
        })
}

fn parse_number(raw: &str, decimal: char) -> Option<f64> {
    let value = if decimal == ',' {
        raw.replace('.', "").replace(',', ".").parse().ok()?
    } else {
        raw.parse().ok()?
    };
    Some(value)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, RoctraderError> {
        let bars = self.read_bars(&self.csv_path(code))?;
        Ok(bars
            .into_iter()
            .filter(|b| start_date.is_none_or(|start| b.date >= start))
            .filter(|b| end_date.is_none_or(|end| b.date <= end))
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RoctraderError> {
        let mut symbols = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RoctraderError> {
        let bars = self.read_bars(&self.csv_path(code))?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
