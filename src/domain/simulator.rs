//! Position simulation: a fold over the bar sequence applying confirmed
//! actions at their execution bar.
//!
//! Trades open and close at the execution bar's close. Any lot still open
//! after the last bar is force-closed at the last close, so the ledger never
//! ends with a dangling open trade.

use serde::Serialize;
use tracing::{debug, info};

use super::debounce::{Action, ActionKind};
use super::error::RoctraderError;
use super::ohlcv::OhlcvBar;
use super::portfolio::{EquityPoint, Liquidation, Portfolio};
use super::position::{ExitReason, Side, Trade};
use super::sizing::SizingPolicy;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;

/// How Buy and Sell actions map onto open lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// One long lot at a time; Buys while holding are ignored.
    #[default]
    SinglePosition,
    /// Every Buy adds a long lot; a Sell liquidates all of them.
    Stacking,
    /// Every Buy adds a long lot; a Sell closes the oldest one.
    StackingFifo,
    /// Always in the market after the first action: Buy flips short to long,
    /// Sell flips long to short.
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Opened,
    Closed,
    Flipped,
    Ignored,
}

impl PositionMode {
    fn apply(
        &self,
        portfolio: &mut Portfolio,
        kind: ActionKind,
        index: usize,
        bar: &OhlcvBar,
    ) -> Result<StepOutcome, RoctraderError> {
        let (date, price) = (bar.date, bar.close);
        match (self, kind) {
            (PositionMode::SinglePosition, ActionKind::Buy) => {
                if portfolio.open_count() > 0 {
                    return Ok(StepOutcome::Ignored);
                }
                portfolio.open_trade(Side::Long, index, date, price);
                Ok(StepOutcome::Opened)
            }
            (PositionMode::Stacking | PositionMode::StackingFifo, ActionKind::Buy) => {
                portfolio.open_trade(Side::Long, index, date, price);
                Ok(StepOutcome::Opened)
            }
            (PositionMode::SinglePosition | PositionMode::Stacking, ActionKind::Sell) => {
                let closed = portfolio
                    .liquidate(Side::Long, index, date, price, ExitReason::Signal)?
                    .is_some();
                Ok(if closed {
                    StepOutcome::Closed
                } else {
                    StepOutcome::Ignored
                })
            }
            (PositionMode::StackingFifo, ActionKind::Sell) => {
                let closed = portfolio
                    .close_oldest(Side::Long, index, date, price, ExitReason::Signal)?
                    .is_some();
                Ok(if closed {
                    StepOutcome::Closed
                } else {
                    StepOutcome::Ignored
                })
            }
            (PositionMode::Reversal, kind) => {
                let (exit_side, entry_side) = match kind {
                    ActionKind::Buy => (Side::Short, Side::Long),
                    ActionKind::Sell => (Side::Long, Side::Short),
                };
                let closed = portfolio
                    .liquidate(exit_side, index, date, price, ExitReason::Signal)?
                    .is_some();
                if portfolio.has_open(entry_side) {
                    return Ok(StepOutcome::Ignored);
                }
                portfolio.open_trade(entry_side, index, date, price);
                Ok(if closed {
                    StepOutcome::Flipped
                } else {
                    StepOutcome::Opened
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub sizing: SizingPolicy,
    pub mode: PositionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            sizing: SizingPolicy::default(),
            mode: PositionMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub ledger: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub liquidations: Vec<Liquidation>,
    pub ignored_actions: usize,
}

impl SimulationResult {
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.ledger.iter().filter(|t| !t.is_open())
    }

    pub fn trade_profits(&self) -> Vec<f64> {
        self.closed_trades().filter_map(|t| t.profit).collect()
    }
}

/// Walk `bars` in order, executing `actions` at their execution index.
///
/// `actions` must be executable and in execution order, as produced by
/// [`debounce`](super::debounce::debounce) over the same bars.
pub fn simulate(
    bars: &[OhlcvBar],
    actions: &[Action],
    config: &SimulationConfig,
) -> Result<SimulationResult, RoctraderError> {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(RoctraderError::data("cannot simulate an empty series")),
    };

    let mut scheduled = Vec::with_capacity(actions.len());
    for action in actions {
        match action.execution_index() {
            Some(index) if index < bars.len() => scheduled.push((index, action.kind)),
            Some(index) => {
                return Err(RoctraderError::data(format!(
                    "action executes at bar {} beyond series of {} bars",
                    index,
                    bars.len()
                )));
            }
            None => {}
        }
    }
    if scheduled.windows(2).any(|w| w[0].0 > w[1].0) {
        return Err(RoctraderError::data("actions are not in execution order"));
    }

    let portfolio = Portfolio::new(config.initial_capital, config.sizing, first.date);
    let mut pending = scheduled.into_iter().peekable();
    let mut ignored = 0usize;

    let mut portfolio = bars
        .iter()
        .enumerate()
        .try_fold(portfolio, |mut portfolio, (index, bar)| {
            while let Some((_, kind)) = pending.next_if(|&(at, _)| at == index) {
                let outcome = config.mode.apply(&mut portfolio, kind, index, bar)?;
                if outcome == StepOutcome::Ignored {
                    ignored += 1;
                }
                debug!(index, date = %bar.date, ?kind, ?outcome, "action executed");
            }
            Ok::<_, RoctraderError>(portfolio)
        })?;

    let last_index = bars.len() - 1;
    for side in [Side::Long, Side::Short] {
        if let Some(event) =
            portfolio.liquidate(side, last_index, last.date, last.close, ExitReason::EndOfSeries)?
        {
            info!(
                lots = event.lots,
                date = %event.date,
                profit = event.aggregate_profit,
                "force-closed open position at end of series"
            );
        }
    }

    Ok(SimulationResult {
        initial_capital: portfolio.initial_capital,
        final_capital: portfolio.final_capital(),
        ledger: portfolio.ledger,
        equity_curve: portfolio.equity_curve,
        liquidations: portfolio.liquidations,
        ignored_actions: ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::debounce::Execution;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn action(bars: &[OhlcvBar], kind: ActionKind, at: usize) -> Action {
        Action {
            kind,
            anchor_index: at.saturating_sub(2),
            anchor_date: bars[at.saturating_sub(2)].date,
            execution: Execution::At {
                index: at,
                date: bars[at].date,
            },
        }
    }

    fn config(mode: PositionMode) -> SimulationConfig {
        SimulationConfig {
            initial_capital: 1000.0,
            sizing: SizingPolicy::FixedFraction { fraction: 1.0 },
            mode,
        }
    }

    #[test]
    fn single_round_trip() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 105.0, 110.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 2),
            action(&bars, ActionKind::Sell, 4),
        ];
        let result = simulate(&bars, &actions, &config(PositionMode::SinglePosition)).unwrap();

        assert_eq!(result.ledger.len(), 1);
        let trade = &result.ledger[0];
        assert_eq!(trade.open_index, 2);
        assert_eq!(trade.close_index, Some(4));
        assert_eq!(trade.exit_reason, Some(ExitReason::Signal));
        assert!((trade.profit.unwrap() - 100.0).abs() < 1e-9);
        assert!((result.final_capital - 1100.0).abs() < 1e-9);
        assert_eq!(result.equity_curve.len(), 2);
        assert_eq!(result.equity_curve[0].equity, 1000.0);
    }

    #[test]
    fn sell_without_position_is_noop() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let actions = [action(&bars, ActionKind::Sell, 1)];
        let result = simulate(&bars, &actions, &config(PositionMode::SinglePosition)).unwrap();

        assert!(result.ledger.is_empty());
        assert_eq!(result.ignored_actions, 1);
        assert_eq!(result.equity_curve.len(), 1);
    }

    #[test]
    fn single_position_ignores_second_buy() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 10.0, 12.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 1),
            action(&bars, ActionKind::Buy, 3),
        ];
        let result = simulate(&bars, &actions, &config(PositionMode::SinglePosition)).unwrap();

        assert_eq!(result.ledger.len(), 1);
        assert_eq!(result.ignored_actions, 1);
    }

    #[test]
    fn open_trade_is_force_closed_at_last_bar() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 90.0]);
        let actions = [action(&bars, ActionKind::Buy, 2)];
        let result = simulate(&bars, &actions, &config(PositionMode::SinglePosition)).unwrap();

        let trade = &result.ledger[0];
        assert!(!trade.is_open());
        assert_eq!(trade.close_index, Some(3));
        assert_eq!(trade.close_price, Some(90.0));
        assert_eq!(trade.exit_reason, Some(ExitReason::EndOfSeries));
        assert!((result.final_capital - 900.0).abs() < 1e-9);
    }

    #[test]
    fn stacking_liquidates_every_lot_at_once() {
        let bars = make_bars(&[10.0, 10.0, 20.0, 20.0, 40.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 1),
            action(&bars, ActionKind::Buy, 2),
            action(&bars, ActionKind::Sell, 4),
        ];
        let cfg = SimulationConfig {
            sizing: SizingPolicy::FixedFraction { fraction: 0.1 },
            ..config(PositionMode::Stacking)
        };
        let result = simulate(&bars, &actions, &cfg).unwrap();

        assert_eq!(result.ledger.len(), 2);
        assert_eq!(result.liquidations.len(), 1);
        // stakes 100 each; returns 3.0 and 1.0
        assert!((result.liquidations[0].aggregate_profit - 400.0).abs() < 1e-9);
        assert_eq!(result.liquidations[0].lots, 2);
        assert_eq!(result.equity_curve.len(), 3);
        assert!((result.final_capital - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn stacking_fifo_closes_oldest_lot_per_sell() {
        let bars = make_bars(&[10.0, 10.0, 20.0, 20.0, 40.0, 40.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 1),
            action(&bars, ActionKind::Buy, 2),
            action(&bars, ActionKind::Sell, 4),
        ];
        let cfg = SimulationConfig {
            sizing: SizingPolicy::FixedFraction { fraction: 0.1 },
            ..config(PositionMode::StackingFifo)
        };
        let result = simulate(&bars, &actions, &cfg).unwrap();

        assert_eq!(result.ledger.len(), 2);
        assert_eq!(result.ledger[0].close_index, Some(4));
        assert_eq!(result.ledger[0].exit_reason, Some(ExitReason::Signal));
        assert_eq!(result.ledger[1].close_index, Some(5));
        assert_eq!(result.ledger[1].exit_reason, Some(ExitReason::EndOfSeries));
        assert_eq!(result.liquidations.len(), 2);
    }

    #[test]
    fn reversal_flips_between_long_and_short() {
        let bars = make_bars(&[100.0, 100.0, 110.0, 110.0, 99.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 0),
            action(&bars, ActionKind::Sell, 2),
        ];
        let result = simulate(&bars, &actions, &config(PositionMode::Reversal)).unwrap();

        assert_eq!(result.ledger.len(), 2);
        assert_eq!(result.ledger[0].side, Side::Long);
        assert_eq!(result.ledger[1].side, Side::Short);
        // long 100 -> 110 on 1000: +100; short 110 -> 99 on 1100: +110
        assert!((result.ledger[0].profit.unwrap() - 100.0).abs() < 1e-9);
        assert!((result.ledger[1].profit.unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(result.ledger[1].exit_reason, Some(ExitReason::EndOfSeries));
    }

    #[test]
    fn anti_martingale_sizes_from_multiplier() {
        let bars = make_bars(&[100.0, 110.0, 110.0, 121.0, 121.0, 110.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 0),
            action(&bars, ActionKind::Sell, 1),
            action(&bars, ActionKind::Buy, 2),
            action(&bars, ActionKind::Sell, 3),
            action(&bars, ActionKind::Buy, 4),
            action(&bars, ActionKind::Sell, 5),
        ];
        let cfg = SimulationConfig {
            initial_capital: 1_000_000.0,
            sizing: SizingPolicy::anti_martingale(),
            mode: PositionMode::SinglePosition,
        };
        let result = simulate(&bars, &actions, &cfg).unwrap();

        let stakes: Vec<f64> = result.ledger.iter().map(|t| t.stake).collect();
        assert_eq!(stakes, vec![10_000.0, 20_000.0, 40_000.0]);
    }

    #[test]
    fn zero_entry_price_fails_simulation() {
        let bars = make_bars(&[0.0, 1.0, 2.0]);
        let actions = [action(&bars, ActionKind::Buy, 0)];
        let err = simulate(&bars, &actions, &config(PositionMode::SinglePosition)).unwrap_err();
        assert!(matches!(err, RoctraderError::Computation { .. }));
    }

    #[test]
    fn empty_series_is_data_error() {
        assert!(matches!(
            simulate(&[], &[], &SimulationConfig::default()),
            Err(RoctraderError::Data { .. })
        ));
    }

    #[test]
    fn out_of_order_actions_rejected() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let actions = [
            action(&bars, ActionKind::Buy, 3),
            action(&bars, ActionKind::Sell, 1),
        ];
        assert!(simulate(&bars, &actions, &SimulationConfig::default()).is_err());
    }
}
