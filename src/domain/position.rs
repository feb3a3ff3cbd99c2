//! Trades and their lifecycle.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::RoctraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    EndOfSeries,
}

/// Fractional return of a trade: `(exit - entry) / entry` for longs,
/// `(entry - exit) / entry` for shorts.
pub fn trade_return(side: Side, entry_price: f64, exit_price: f64) -> Result<f64, RoctraderError> {
    if entry_price == 0.0 {
        return Err(RoctraderError::computation(
            "trade_return",
            "entry price is zero",
        ));
    }
    let change = match side {
        Side::Long => exit_price - entry_price,
        Side::Short => entry_price - exit_price,
    };
    Ok(change / entry_price)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: usize,
    pub side: Side,
    pub status: TradeStatus,
    pub open_index: usize,
    pub open_date: NaiveDate,
    pub open_price: f64,
    /// Currency committed at open.
    pub stake: f64,
    pub close_index: Option<usize>,
    pub close_date: Option<NaiveDate>,
    pub close_price: Option<f64>,
    /// Per-unit price move, close minus open.
    pub price_change: Option<f64>,
    pub trade_return: Option<f64>,
    /// Realised profit in currency: stake * trade_return.
    pub profit: Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn open(
        id: usize,
        side: Side,
        index: usize,
        date: NaiveDate,
        price: f64,
        stake: f64,
    ) -> Self {
        Trade {
            id,
            side,
            status: TradeStatus::Open,
            open_index: index,
            open_date: date,
            open_price: price,
            stake,
            close_index: None,
            close_date: None,
            close_price: None,
            price_change: None,
            trade_return: None,
            profit: None,
            exit_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Close the trade and return its realised profit.
    pub fn close(
        &mut self,
        index: usize,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Result<f64, RoctraderError> {
        let ret = trade_return(self.side, self.open_price, price)?;
        let profit = self.stake * ret;

        self.status = TradeStatus::Closed;
        self.close_index = Some(index);
        self.close_date = Some(date);
        self.close_price = Some(price);
        self.price_change = Some(price - self.open_price);
        self.trade_return = Some(ret);
        self.profit = Some(profit);
        self.exit_reason = Some(reason);

        Ok(profit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn long_return() {
        let r = trade_return(Side::Long, 100.0, 110.0).unwrap();
        assert!((r - 0.10).abs() < 1e-12);
    }

    #[test]
    fn short_return() {
        let r = trade_return(Side::Short, 100.0, 110.0).unwrap();
        assert!((r - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn zero_entry_price_is_computation_error() {
        let err = trade_return(Side::Long, 0.0, 10.0).unwrap_err();
        assert!(
            matches!(err, RoctraderError::Computation { ref metric, .. } if metric == "trade_return")
        );
    }

    #[test]
    fn open_trade_fields() {
        let trade = Trade::open(0, Side::Long, 3, date(4), 50.0, 1000.0);
        assert!(trade.is_open());
        assert_eq!(trade.price_change, None);
        assert_eq!(trade.profit, None);
    }

    #[test]
    fn close_long_trade() {
        let mut trade = Trade::open(0, Side::Long, 3, date(4), 50.0, 1000.0);
        let profit = trade.close(8, date(9), 55.0, ExitReason::Signal).unwrap();

        assert!((profit - 100.0).abs() < 1e-9);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.price_change, Some(5.0));
        assert_eq!(trade.close_index, Some(8));
        assert_eq!(trade.exit_reason, Some(ExitReason::Signal));
    }

    #[test]
    fn close_short_trade_loses_on_rally() {
        let mut trade = Trade::open(1, Side::Short, 0, date(1), 100.0, 500.0);
        let profit = trade.close(1, date(2), 110.0, ExitReason::EndOfSeries).unwrap();
        assert!((profit - (-50.0)).abs() < 1e-9);
        assert_eq!(trade.price_change, Some(10.0));
    }

    #[test]
    fn failed_close_leaves_trade_open() {
        let mut trade = Trade::open(0, Side::Long, 0, date(1), 0.0, 100.0);
        assert!(trade.close(1, date(2), 1.0, ExitReason::Signal).is_err());
        assert!(trade.is_open());
        assert_eq!(trade.price_change, None);
    }
}
