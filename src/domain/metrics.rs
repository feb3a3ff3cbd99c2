//! Performance statistics over a trade ledger and equity curve.
//!
//! Divisions with a zero denominator (no trades, no losses, zero spread,
//! non-positive peak) report `0.0` instead of failing. Percentages
//! (`win_rate`, `max_drawdown`) are in the 0..100 range.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::simulator::SimulationResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_profit: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub win_loss_ratio: f64,
    pub average_profit: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_stddev: f64,
    pub sharpe_like: f64,
    pub max_drawdown: f64,
    /// Lost more than the starting capital.
    pub ruined: bool,
}

impl Metrics {
    pub fn compute(result: &SimulationResult) -> Self {
        let initial_capital = result.initial_capital;
        let final_capital = result
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(result.final_capital);
        let total_profit = final_capital - initial_capital;

        let profits = result.trade_profits();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for &pnl in &profits {
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = profits.len();

        let win_rate = ratio(trades_won as f64, total_trades as f64) * 100.0;
        let win_loss_ratio = ratio(trades_won as f64, trades_lost as f64);
        let average_profit = ratio(total_profit, total_trades as f64);
        let avg_win = ratio(total_wins, trades_won as f64);
        let avg_loss = ratio(total_losses, trades_lost as f64);

        let (mean, profit_stddev) = mean_and_population_stddev(&profits);
        let sharpe_like = ratio(mean, profit_stddev);

        let max_drawdown = compute_max_drawdown(&result.equity_curve) * 100.0;

        Metrics {
            initial_capital,
            final_capital,
            total_profit,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            win_loss_ratio,
            average_profit,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_stddev,
            sharpe_like,
            max_drawdown,
            ruined: total_profit < 0.0 && total_profit.abs() > initial_capital,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Mean and population standard deviation; (0, 0) for an empty slice.
pub fn mean_and_population_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Largest peak-to-trough decline as a fraction of the running peak.
pub fn compute_max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }

    max_dd
}
