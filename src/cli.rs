//! CLI definition and dispatch.
//!
//! Progress and errors go through `tracing` (stderr); result tables are
//! printed to stdout.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    build_param_grid, build_param_sweep, build_simulation_config, build_strategy, date_range,
    validate_backtest_config, validate_data_config, validate_strategy_config,
    validate_sweep_config,
};
use crate::domain::error::RoctraderError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::Trade;
use crate::domain::sizing::SizingPolicy;
use crate::domain::sweep::{ParamGrid, ParamSweep, SweepReport};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "roctrader", about = "Indicator-signal backtester with parameter sweeps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest and print its statistics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Symbol to load instead of [data] code
        #[arg(long)]
        code: Option<String>,
        /// Write chart records (bars, signals, actions, ledger, equity) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Print the trade ledger
        #[arg(long)]
        trades: bool,
    },
    /// Run the [sweep] parameter grid and print a ranked table
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        /// Number of ranked rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Write every sweep row as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Evaluate configurations one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            code,
            json,
            trades,
        } => run_backtest_command(&config, code.as_deref(), json.as_deref(), trades),
        Command::Sweep {
            config,
            code,
            top,
            json,
            sequential,
        } => run_sweep_command(&config, code.as_deref(), top, json.as_deref(), sequential),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, code } => run_info(&config, code.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: RoctraderError) -> ExitCode {
    error!("{err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RoctraderError> {
    Ok(BacktestConfig {
        strategy: build_strategy(config)?,
        simulation: build_simulation_config(config)?,
    })
}

/// Symbol from the command line, else `[data] code`.
pub fn resolve_code(code_override: Option<&str>, config: &dyn ConfigPort) -> Option<String> {
    code_override
        .map(str::to_string)
        .or_else(|| config.get_string("data", "code"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Fetch bars for `code`; an empty result is `NoData`.
pub fn load_bars(
    data_port: &dyn DataPort,
    code: &str,
    config: &dyn ConfigPort,
) -> Result<Vec<OhlcvBar>, RoctraderError> {
    let (start, end) = date_range(config)?;
    let bars = data_port.fetch_ohlcv(code, start, end)?;
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => {
            info!(code, bars = bars.len(), from = %first.date, to = %last.date, "loaded price data");
            Ok(bars)
        }
        _ => Err(RoctraderError::NoData {
            code: code.to_string(),
        }),
    }
}

/// Load, validate and prepare everything a command needs before touching data.
fn prepare(
    config_path: &Path,
    code_override: Option<&str>,
) -> Result<(FileConfigAdapter, CsvAdapter, String), ExitCode> {
    let config = load_config(config_path)?;
    validate_data_config(&config).map_err(fail)?;
    let data_port = CsvAdapter::from_config(&config).map_err(fail)?;
    let code = resolve_code(code_override, &config).ok_or_else(|| {
        fail(RoctraderError::ConfigMissing {
            section: "data".into(),
            key: "code".into(),
        })
    })?;
    Ok((config, data_port, code))
}

fn run_backtest_command(
    config_path: &Path,
    code_override: Option<&str>,
    json_path: Option<&Path>,
    show_trades: bool,
) -> ExitCode {
    let (config, data_port, code) = match prepare(config_path, code_override) {
        Ok(prepared) => prepared,
        Err(exit) => return exit,
    };

    let result = match run_backtest_pipeline(&data_port, &config, &code) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    println!("{}", format_summary(&result));
    if show_trades {
        println!("{}", format_trades(&result.simulation.ledger));
    }

    if let Some(path) = json_path {
        if let Err(e) = JsonReportAdapter::pretty().write(&result, &path.to_string_lossy()) {
            return fail(e);
        }
    }
    ExitCode::SUCCESS
}

/// Stages after config loading: fetch bars, build the backtest config, run it.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    code: &str,
) -> Result<BacktestResult, RoctraderError> {
    let bt_config = build_backtest_config(config)?;
    info!(strategy = %bt_config.strategy.name, "running backtest");
    let bars = load_bars(data_port, code, config)?;
    run_backtest(code, &bars, &bt_config)
}

fn run_sweep_command(
    config_path: &Path,
    code_override: Option<&str>,
    top: usize,
    json_path: Option<&Path>,
    sequential: bool,
) -> ExitCode {
    let (config, data_port, code) = match prepare(config_path, code_override) {
        Ok(prepared) => prepared,
        Err(exit) => return exit,
    };

    let report = match run_sweep_pipeline(&data_port, &config, &code, sequential) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    println!("{}", format_sweep_table(&report, top));

    if let Some(path) = json_path {
        if let Err(e) = JsonReportAdapter::pretty().write_sweep(&report, &path.to_string_lossy()) {
            return fail(e);
        }
    }
    ExitCode::SUCCESS
}

pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    code: &str,
    sequential: bool,
) -> Result<SweepReport, RoctraderError> {
    let base = build_backtest_config(config)?;
    let grid: ParamGrid = build_param_grid(config)?;
    let mut sweep: ParamSweep = build_param_sweep(config)?;
    if sequential {
        sweep = sweep.with_parallelism(false);
    }
    let bars = load_bars(data_port, code, config)?;
    sweep.run(code, &bars, &grid, &base)
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(exit) => return exit,
    };

    let checks: [(&str, fn(&dyn ConfigPort) -> Result<(), RoctraderError>); 4] = [
        ("data", validate_data_config),
        ("backtest", validate_backtest_config),
        ("strategy", validate_strategy_config),
        ("sweep", validate_sweep_config),
    ];
    for (section, check) in checks {
        if let Err(e) = check(&config) {
            return fail(e);
        }
        info!(section, "section valid");
    }

    match build_backtest_config(&config) {
        Ok(bt) => {
            println!("Strategy:  {} ({})", bt.strategy.name, bt.strategy);
            println!("Sizing:    {}", bt.simulation.sizing.name());
            println!("Mode:      {:?}", bt.simulation.mode);
            println!("Capital:   {:.2}", bt.simulation.initial_capital);
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_info(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let (_config, data_port, code) = match prepare(config_path, code_override) {
        Ok(prepared) => prepared,
        Err(exit) => return exit,
    };

    match data_port.get_data_range(&code) {
        Ok(Some((min_date, max_date, count))) => {
            println!("{}: {} bars, {} to {}", code, count, min_date, max_date);
            ExitCode::SUCCESS
        }
        Ok(None) => fail(RoctraderError::NoData { code }),
        Err(e) => fail(e),
    }
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(exit) => return exit,
    };
    let data_port = match CsvAdapter::from_config(&config) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    match data_port.list_symbols() {
        Ok(symbols) if symbols.is_empty() => {
            warn!("no symbols found");
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{}", symbol);
            }
            info!(count = symbols.len(), "symbols found");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn format_metrics(metrics: &Metrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Initial Capital:  {:.2}", metrics.initial_capital);
    let _ = writeln!(out, "Final Capital:    {:.2}", metrics.final_capital);
    let _ = writeln!(out, "Total Profit:     {:.2}", metrics.total_profit);
    let _ = writeln!(out, "Total Trades:     {}", metrics.total_trades);
    let _ = writeln!(
        out,
        "Wins / Losses:    {} / {} ({} breakeven)",
        metrics.trades_won, metrics.trades_lost, metrics.trades_breakeven
    );
    let _ = writeln!(out, "Win Rate:         {:.2}%", metrics.win_rate);
    let _ = writeln!(out, "Win/Loss Ratio:   {:.2}", metrics.win_loss_ratio);
    let _ = writeln!(out, "Average Profit:   {:.2}", metrics.average_profit);
    let _ = writeln!(
        out,
        "Avg Win / Loss:   {:.2} / {:.2}",
        metrics.avg_win, metrics.avg_loss
    );
    let _ = writeln!(
        out,
        "Largest Win/Loss: {:.2} / {:.2}",
        metrics.largest_win, metrics.largest_loss
    );
    let _ = writeln!(out, "Max Drawdown:     {:.2}%", metrics.max_drawdown);
    let _ = write!(out, "Sharpe-like:      {:.4}", metrics.sharpe_like);
    if metrics.ruined {
        let _ = write!(out, "\nRUINED: loss exceeds initial capital");
    }
    out
}

pub fn format_summary(result: &BacktestResult) -> String {
    format!(
        "=== {} [{}] {} / {:?} ===\n{}",
        result.code,
        result.strategy,
        result.simulation_config.sizing.name(),
        result.simulation_config.mode,
        format_metrics(&result.metrics)
    )
}

pub fn format_trades(ledger: &[Trade]) -> String {
    let mut out = String::from(
        "  #  side   open date    open price  close date   close price      change        stake       profit  exit\n",
    );
    for trade in ledger {
        let _ = writeln!(
            out,
            "{:>3}  {:<5}  {}  {:>10.4}  {}  {:>11.4}  {:>10.4}  {:>11.2}  {:>11.2}  {}",
            trade.id,
            format!("{:?}", trade.side).to_lowercase(),
            trade.open_date,
            trade.open_price,
            trade
                .close_date
                .map_or_else(|| "-".repeat(10), |d| d.to_string()),
            trade.close_price.unwrap_or(f64::NAN),
            trade.price_change.unwrap_or(f64::NAN),
            trade.stake,
            trade.profit.unwrap_or(0.0),
            trade
                .exit_reason
                .map_or("open".to_string(), |r| format!("{:?}", r).to_lowercase()),
        );
    }
    out
}

pub fn format_sweep_table(report: &SweepReport, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "    {:<4} {:<22} {:>4} {:>4} {:>8} {:>7} {:>8} {:>8} {:>14} {:>8} {:>8}",
        "rank", "indicator", "run>", "lag", "fraction", "trades", "win%", "w/l", "profit", "maxdd%", "sharpe"
    );

    for (rank, row) in report.ranked_rows().take(top).enumerate() {
        let Some(m) = row.metrics() else { continue };
        let fraction = match row.config.simulation.sizing {
            SizingPolicy::FixedFraction { fraction } => fraction,
            SizingPolicy::AntiMartingale { base_fraction } => base_fraction,
        };
        let marker = if rank == 0 { " *" } else { "  " };
        let _ = writeln!(
            out,
            "{}  {:<4} {:<22} {:>4} {:>4} {:>8.3} {:>7} {:>8.2} {:>8.2} {:>14.2} {:>8.2} {:>8.4}",
            marker,
            rank + 1,
            row.config.strategy.indicator.to_string(),
            row.config.strategy.debounce.min_run_length,
            row.config.strategy.debounce.lag,
            fraction,
            m.total_trades,
            m.win_rate,
            m.win_loss_ratio,
            m.total_profit,
            m.max_drawdown,
            m.sharpe_like,
        );
    }

    let _ = write!(
        out,
        "{} configurations, {} ranked by {}; excluded: {} below {} trades, {} ruined, {} failed",
        report.rows.len(),
        report.ranked.len(),
        report.ranking.name(),
        report.excluded_few_trades,
        report.min_trades,
        report.excluded_ruined,
        report.failed
    );
    out
}
