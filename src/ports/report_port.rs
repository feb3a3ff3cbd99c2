//! Report output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RoctraderError;
use crate::domain::sweep::SweepReport;

/// Port for exporting backtest and sweep results.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), RoctraderError>;

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), RoctraderError>;
}
