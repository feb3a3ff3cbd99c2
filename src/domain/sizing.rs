//! Capital sizing policies.
//!
//! A policy answers two questions for the simulator: how large the next
//! stake is (`size`) and how the capital state moves after a trade closes
//! (`update`). The simulator never inspects which policy it holds.

use serde::Serialize;

pub const DEFAULT_FRACTION: f64 = 0.10;
pub const DEFAULT_BASE_FRACTION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapitalState {
    pub current_capital: f64,
    pub base_trade_size: f64,
    pub multiplier: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Stake a constant fraction of current capital.
    FixedFraction { fraction: f64 },
    /// Stake `base_fraction` of initial capital, doubled after each win and
    /// reset after a loss or breakeven.
    AntiMartingale { base_fraction: f64 },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::FixedFraction {
            fraction: DEFAULT_FRACTION,
        }
    }
}

impl SizingPolicy {
    pub fn anti_martingale() -> Self {
        SizingPolicy::AntiMartingale {
            base_fraction: DEFAULT_BASE_FRACTION,
        }
    }

    /// Fresh state for one simulation run.
    pub fn initial_state(&self, initial_capital: f64) -> CapitalState {
        let base_trade_size = match *self {
            SizingPolicy::FixedFraction { fraction } => fraction * initial_capital,
            SizingPolicy::AntiMartingale { base_fraction } => base_fraction * initial_capital,
        };
        CapitalState {
            current_capital: initial_capital,
            base_trade_size,
            multiplier: 1,
        }
    }

    /// Stake in currency for the next trade.
    pub fn size(&self, state: &CapitalState) -> f64 {
        match *self {
            SizingPolicy::FixedFraction { fraction } => fraction * state.current_capital,
            SizingPolicy::AntiMartingale { .. } => {
                state.base_trade_size * state.multiplier as f64
            }
        }
    }

    /// Fold a closed trade's profit into the state.
    pub fn update(&self, state: CapitalState, profit: f64) -> CapitalState {
        let current_capital = state.current_capital + profit;
        match *self {
            SizingPolicy::FixedFraction { .. } => CapitalState {
                current_capital,
                ..state
            },
            SizingPolicy::AntiMartingale { .. } => CapitalState {
                current_capital,
                multiplier: if profit > 0.0 {
                    state.multiplier.saturating_mul(2)
                } else {
                    1
                },
                ..state
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SizingPolicy::FixedFraction { .. } => "fixed_fraction",
            SizingPolicy::AntiMartingale { .. } => "anti_martingale",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_fraction_sizes_from_current_capital() {
        let policy = SizingPolicy::FixedFraction { fraction: 0.1 };
        let state = policy.initial_state(1_000_000.0);
        assert!((policy.size(&state) - 100_000.0).abs() < 1e-9);

        let state = policy.update(state, 50_000.0);
        assert!((state.current_capital - 1_050_000.0).abs() < 1e-9);
        assert!((policy.size(&state) - 105_000.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_fraction_multiplier_never_moves() {
        let policy = SizingPolicy::FixedFraction { fraction: 0.2 };
        let state = policy.update(policy.initial_state(1000.0), 10.0);
        assert_eq!(state.multiplier, 1);
    }

    #[test]
    fn anti_martingale_base_is_one_percent_of_initial() {
        let policy = SizingPolicy::anti_martingale();
        let state = policy.initial_state(1_000_000.0);
        assert!((state.base_trade_size - 10_000.0).abs() < 1e-9);
        assert!((policy.size(&state) - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn anti_martingale_doubles_on_win_resets_on_loss() {
        let policy = SizingPolicy::anti_martingale();
        let mut state = policy.initial_state(1_000_000.0);

        for _ in 0..3 {
            state = policy.update(state, 100.0);
        }
        assert_eq!(state.multiplier, 8);
        assert!((policy.size(&state) - 80_000.0).abs() < 1e-9);

        state = policy.update(state, -1.0);
        assert_eq!(state.multiplier, 1);

        state = policy.update(state, 5.0);
        state = policy.update(state, 0.0);
        assert_eq!(state.multiplier, 1);
    }

    #[test]
    fn anti_martingale_base_ignores_capital_growth() {
        let policy = SizingPolicy::anti_martingale();
        let state = policy.initial_state(1_000_000.0);
        let state = policy.update(state, -500_000.0);
        assert!((state.base_trade_size - 10_000.0).abs() < 1e-9);
        assert!((state.current_capital - 500_000.0).abs() < 1e-9);
    }

    #[test]
    fn multiplier_saturates() {
        let policy = SizingPolicy::anti_martingale();
        let mut state = policy.initial_state(1.0);
        state.multiplier = u64::MAX;
        let state = policy.update(state, 1.0);
        assert_eq!(state.multiplier, u64::MAX);
    }
}
