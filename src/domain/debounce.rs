//! Run detection and lagged action confirmation.
//!
//! Consecutive identical signals form a [`Run`]. A run longer than
//! `min_run_length` bars confirms a Buy (Long) or Sell (Short) anchored at the
//! run's first bar and executed `lag` bars later in bar-index space. Actions
//! whose execution falls past the last bar expire; Sells that would execute
//! before the first Buy are discarded since there is nothing to close.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::signal::{SignalSeries, SignalValue};

pub const DEFAULT_MIN_RUN_LENGTH: usize = 2;
pub const DEFAULT_LAG: usize = 2;

/// Where the execution lag is counted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LagAnchor {
    #[default]
    RunStart,
    RunEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DebounceConfig {
    pub min_run_length: usize,
    pub lag: usize,
    pub anchor: LagAnchor,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        DebounceConfig {
            min_run_length: DEFAULT_MIN_RUN_LENGTH,
            lag: DEFAULT_LAG,
            anchor: LagAnchor::RunStart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Run {
    pub signal: SignalValue,
    pub start: usize,
    pub length: usize,
}

impl Run {
    /// Index of the run's last bar.
    pub fn end(&self) -> usize {
        self.start + self.length - 1
    }

    /// The action this run confirms, if any.
    pub fn action(&self, min_run_length: usize) -> Option<ActionKind> {
        if self.length <= min_run_length {
            return None;
        }
        match self.signal {
            SignalValue::Long => Some(ActionKind::Buy),
            SignalValue::Short => Some(ActionKind::Sell),
            SignalValue::Flat => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Execution {
    At { index: usize, date: NaiveDate },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub anchor_index: usize,
    pub anchor_date: NaiveDate,
    pub execution: Execution,
}

impl Action {
    pub fn execution_index(&self) -> Option<usize> {
        match self.execution {
            Execution::At { index, .. } => Some(index),
            Execution::Expired => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DebouncedActions {
    pub runs: Vec<Run>,
    /// Executable actions in execution order.
    pub actions: Vec<Action>,
    /// Confirmed actions whose lag ran past the end of the series.
    pub expired: Vec<Action>,
    /// Sells executing before the first Buy.
    pub discarded: Vec<Action>,
}

impl DebouncedActions {
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }
}

/// Split a signal sequence into maximal runs in a single pass.
pub fn detect_runs(signals: &[SignalValue]) -> Vec<Run> {
    let mut runs = Vec::new();
    let Some(&first) = signals.first() else {
        return runs;
    };

    let mut current = first;
    let mut start = 0;
    for (i, &signal) in signals.iter().enumerate().skip(1) {
        if signal != current {
            runs.push(Run {
                signal: current,
                start,
                length: i - start,
            });
            current = signal;
            start = i;
        }
    }
    runs.push(Run {
        signal: current,
        start,
        length: signals.len() - start,
    });

    runs
}

pub fn debounce_series(series: &SignalSeries, config: &DebounceConfig) -> DebouncedActions {
    let dates: Vec<NaiveDate> = series.points.iter().map(|p| p.date).collect();
    debounce(&dates, &series.signals(), config)
}

/// Turn per-bar signals into confirmed, lagged actions.
///
/// `dates[i]` is the timestamp of the bar carrying `signals[i]`.
pub fn debounce(
    dates: &[NaiveDate],
    signals: &[SignalValue],
    config: &DebounceConfig,
) -> DebouncedActions {
    let len = signals.len().min(dates.len());
    let runs = detect_runs(&signals[..len]);

    let mut actions = Vec::new();
    let mut expired = Vec::new();

    for run in &runs {
        let Some(kind) = run.action(config.min_run_length) else {
            continue;
        };

        let base = match config.anchor {
            LagAnchor::RunStart => run.start,
            LagAnchor::RunEnd => run.end(),
        };
        let execution = match base.checked_add(config.lag) {
            Some(target) if target < len => Execution::At {
                index: target,
                date: dates[target],
            },
            _ => Execution::Expired,
        };

        let action = Action {
            kind,
            anchor_index: run.start,
            anchor_date: dates[run.start],
            execution,
        };

        match execution {
            Execution::At { .. } => actions.push(action),
            Execution::Expired => expired.push(action),
        }
    }

    let first_buy = actions
        .iter()
        .find(|a| a.kind == ActionKind::Buy)
        .and_then(Action::execution_index);

    let (actions, discarded): (Vec<Action>, Vec<Action>) =
        actions.into_iter().partition(|a| match (a.kind, first_buy) {
            (ActionKind::Buy, _) => true,
            (ActionKind::Sell, Some(buy)) => a.execution_index().is_some_and(|i| i >= buy),
            (ActionKind::Sell, None) => false,
        });

    debug!(
        runs = runs.len(),
        actions = actions.len(),
        expired = expired.len(),
        discarded = discarded.len(),
        "debounced signals"
    );

    DebouncedActions {
        runs,
        actions,
        expired,
        discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn signals(pattern: &[i8]) -> Vec<SignalValue> {
        pattern.iter().map(|&v| SignalValue::from_i8(v)).collect()
    }

    #[test]
    fn runs_partition_the_series() {
        let runs = detect_runs(&signals(&[1, 1, 0, -1, -1, -1, 1]));
        assert_eq!(runs.len(), 4);
        assert_eq!(runs.iter().map(|r| r.length).sum::<usize>(), 7);
        assert_eq!(runs[1].start, 2);
        assert_eq!(runs[2].end(), 5);
        for pair in runs.windows(2) {
            assert_ne!(pair[0].signal, pair[1].signal);
            assert_eq!(pair[0].end() + 1, pair[1].start);
        }
    }

    #[test]
    fn no_runs_for_empty_input() {
        assert!(detect_runs(&[]).is_empty());
    }

    #[test]
    fn ten_bar_scenario() {
        let pattern = [1, 1, 1, 1, -1, -1, -1, -1, 1, 1];
        let d = dates(pattern.len());
        let out = debounce(&d, &signals(&pattern), &DebounceConfig::default());

        assert_eq!(out.actions.len(), 2);
        let buy = out.actions[0];
        assert_eq!(buy.kind, ActionKind::Buy);
        assert_eq!(buy.anchor_index, 0);
        assert_eq!(buy.execution, Execution::At { index: 2, date: d[2] });

        let sell = out.actions[1];
        assert_eq!(sell.kind, ActionKind::Sell);
        assert_eq!(sell.anchor_index, 4);
        assert_eq!(sell.execution_index(), Some(6));

        assert!(out.expired.is_empty());
        assert!(out.discarded.is_empty());
    }

    #[test]
    fn run_of_exactly_min_length_is_ignored() {
        let pattern = [1, 1, -1, -1, -1, -1, -1];
        let out = debounce(&dates(7), &signals(&pattern), &DebounceConfig::default());
        assert_eq!(out.count(ActionKind::Buy), 0);
    }

    #[test]
    fn run_of_min_plus_one_confirms() {
        let pattern = [1, 1, 1, 0, 0, 0];
        let out = debounce(&dates(6), &signals(&pattern), &DebounceConfig::default());
        assert_eq!(out.count(ActionKind::Buy), 1);
    }

    #[test]
    fn flat_runs_confirm_nothing() {
        let pattern = [0, 0, 0, 0, 0];
        let out = debounce(&dates(5), &signals(&pattern), &DebounceConfig::default());
        assert!(out.actions.is_empty());
        assert_eq!(out.runs.len(), 1);
    }

    #[test]
    fn single_flat_bar_splits_runs() {
        let pattern = [1, 1, 1, 0, 1, 1, 1, 0, 0];
        let out = debounce(&dates(9), &signals(&pattern), &DebounceConfig::default());
        assert_eq!(out.count(ActionKind::Buy), 2);
        assert_eq!(out.actions[0].anchor_index, 0);
        assert_eq!(out.actions[1].anchor_index, 4);
    }

    #[test]
    fn lag_past_end_expires() {
        let pattern = [-1, -1, -1, -1, 1, 1, 1];
        let out = debounce(&dates(7), &signals(&pattern), &DebounceConfig::default());

        // Buy anchored at 4 would execute at 6 (last bar): still executable.
        assert_eq!(out.count(ActionKind::Buy), 1);

        let config = DebounceConfig {
            lag: 3,
            ..DebounceConfig::default()
        };
        let out = debounce(&dates(7), &signals(&pattern), &config);
        assert_eq!(out.count(ActionKind::Buy), 0);
        assert_eq!(out.expired.len(), 1);
        assert_eq!(out.expired[0].execution, Execution::Expired);
    }

    #[test]
    fn leading_sells_are_discarded() {
        let pattern = [-1, -1, -1, 1, 1, 1, -1, -1, -1, 0, 0];
        let out = debounce(&dates(11), &signals(&pattern), &DebounceConfig::default());

        assert_eq!(out.discarded.len(), 1);
        assert_eq!(out.discarded[0].anchor_index, 0);
        assert_eq!(out.actions.len(), 2);
        assert_eq!(out.actions[0].kind, ActionKind::Buy);
        assert_eq!(out.actions[1].kind, ActionKind::Sell);
    }

    #[test]
    fn sells_without_any_buy_are_discarded() {
        let pattern = [-1, -1, -1, -1, 0];
        let out = debounce(&dates(5), &signals(&pattern), &DebounceConfig::default());
        assert!(out.actions.is_empty());
        assert_eq!(out.discarded.len(), 1);
    }

    #[test]
    fn run_end_anchor_counts_lag_from_last_bar() {
        let pattern = [1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1, -1];
        let config = DebounceConfig {
            anchor: LagAnchor::RunEnd,
            ..DebounceConfig::default()
        };
        let out = debounce(&dates(12), &signals(&pattern), &config);

        // Long run ends at 3, executes at 5; Short run ends at 11, expires.
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].execution_index(), Some(5));
        assert_eq!(out.actions[0].anchor_index, 0);
        assert_eq!(out.expired.len(), 1);
    }

    #[test]
    fn zero_lag_executes_on_anchor() {
        let pattern = [1, 1, 1];
        let config = DebounceConfig {
            lag: 0,
            ..DebounceConfig::default()
        };
        let out = debounce(&dates(3), &signals(&pattern), &config);
        assert_eq!(out.actions[0].execution_index(), Some(0));
    }

    #[test]
    fn huge_lag_expires_instead_of_wrapping() {
        let pattern = [0, 0, 1, 1, 1, 0, 0];
        for anchor in [LagAnchor::RunStart, LagAnchor::RunEnd] {
            let config = DebounceConfig {
                min_run_length: 2,
                lag: usize::MAX,
                anchor,
            };
            let out = debounce(&dates(7), &signals(&pattern), &config);
            assert!(out.actions.is_empty());
            assert_eq!(out.expired.len(), 1);
            assert_eq!(out.expired[0].anchor_index, 2);
            assert_eq!(out.expired[0].execution, Execution::Expired);
        }
    }
}
