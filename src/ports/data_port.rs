//! Price data access port.

use crate::domain::error::RoctraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` in ascending date order, optionally restricted to
    /// `[start_date, end_date]` (inclusive).
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, RoctraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, RoctraderError>;

    /// First date, last date and bar count, or `None` when the symbol has no rows.
    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RoctraderError>;
}
