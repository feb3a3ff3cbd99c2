//! JSON report adapter implementing ReportPort.
//!
//! Writes the full pipeline output (bars, indicator points, signals, runs,
//! actions, ledger, equity curve, metrics) for chart renderers to consume.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RoctraderError;
use crate::domain::sweep::SweepReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn write_value<T: Serialize>(&self, value: &T, output_path: &str) -> Result<(), RoctraderError> {
        let path = Path::new(output_path);
        let mut writer = BufWriter::new(File::create(path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, value).map_err(std::io::Error::from)?;
        } else {
            serde_json::to_writer(&mut writer, value).map_err(std::io::Error::from)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), RoctraderError> {
        self.write_value(result, output_path)
    }

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), RoctraderError> {
        self.write_value(report, output_path)
    }
}
