//! Ledger, capital and equity tracking for one simulation run.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::RoctraderError;
use super::position::{ExitReason, Side, Trade};
use super::sizing::{CapitalState, SizingPolicy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// One exit event closing every open lot on a side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liquidation {
    pub index: usize,
    pub date: NaiveDate,
    pub side: Side,
    pub lots: usize,
    pub aggregate_profit: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub policy: SizingPolicy,
    pub capital: CapitalState,
    pub ledger: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub liquidations: Vec<Liquidation>,
    open_lots: Vec<usize>,
}

impl Portfolio {
    /// Start a run; the equity curve begins at `initial_capital`.
    pub fn new(initial_capital: f64, policy: SizingPolicy, start_date: NaiveDate) -> Self {
        Portfolio {
            initial_capital,
            policy,
            capital: policy.initial_state(initial_capital),
            ledger: Vec::new(),
            equity_curve: vec![EquityPoint {
                date: start_date,
                equity: initial_capital,
            }],
            liquidations: Vec::new(),
            open_lots: Vec::new(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open_lots.len()
    }

    pub fn has_open(&self, side: Side) -> bool {
        self.open_lots.iter().any(|&i| self.ledger[i].side == side)
    }

    /// Open a lot sized by the policy; returns its ledger id.
    pub fn open_trade(&mut self, side: Side, index: usize, date: NaiveDate, price: f64) -> usize {
        let id = self.ledger.len();
        let stake = self.policy.size(&self.capital);
        self.ledger
            .push(Trade::open(id, side, index, date, price, stake));
        self.open_lots.push(id);
        id
    }

    /// Close every open lot on `side`, oldest first. Each closed lot folds
    /// its profit into capital and appends one equity snapshot.
    pub fn liquidate(
        &mut self,
        side: Side,
        index: usize,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Result<Option<&Liquidation>, RoctraderError> {
        self.close_lots(side, usize::MAX, index, date, price, reason)
    }

    /// Close only the oldest open lot on `side`.
    pub fn close_oldest(
        &mut self,
        side: Side,
        index: usize,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Result<Option<&Liquidation>, RoctraderError> {
        self.close_lots(side, 1, index, date, price, reason)
    }

    fn close_lots(
        &mut self,
        side: Side,
        max_lots: usize,
        index: usize,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Result<Option<&Liquidation>, RoctraderError> {
        let mut taken = 0usize;
        let (closing, keep): (Vec<usize>, Vec<usize>) =
            self.open_lots.iter().copied().partition(|&i| {
                let hit = taken < max_lots && self.ledger[i].side == side;
                if hit {
                    taken += 1;
                }
                hit
            });

        if closing.is_empty() {
            return Ok(None);
        }

        let mut aggregate_profit = 0.0;
        for &id in &closing {
            let profit = self.ledger[id].close(index, date, price, reason)?;
            aggregate_profit += profit;
            self.capital = self.policy.update(self.capital, profit);
            self.equity_curve.push(EquityPoint {
                date,
                equity: self.capital.current_capital,
            });
        }

        self.open_lots = keep;
        self.liquidations.push(Liquidation {
            index,
            date,
            side,
            lots: closing.len(),
            aggregate_profit,
            reason,
        });
        Ok(self.liquidations.last())
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.ledger.iter().filter(|t| !t.is_open())
    }

    pub fn final_capital(&self) -> f64 {
        self.capital.current_capital
    }
}
