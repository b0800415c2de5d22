//! `integrity-check` – verify recorded session databases.
//!
//! ```text
//! integrity-check SESSION.db3 [SESSION.db3 ...]
//! ```
//!
//! Exits 0 when every configured stream in every session holds at least one
//! message, 1 otherwise (including when no session is given).

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use conesim_cli::args::{IntegrityArgs, exit_code_for};
use conesim_cli::config;
use conesim_dataset::{DEFAULT_STREAMS, IntegrityChecker};
use conesim_runtime::init_tracing;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let _otel_guard = init_tracing("integrity-check");

    let paths = match IntegrityArgs::try_parse() {
        Ok(args) => args.databases,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(exit_code_for(&e));
        }
    };

    let streams = match config::load() {
        Ok(cfg) => cfg.integrity_streams,
        Err(e) => {
            warn!(error = %e, "config unreadable; checking the default streams");
            DEFAULT_STREAMS.iter().map(|s| s.to_string()).collect()
        }
    };

    let report = IntegrityChecker::new(streams).check(&paths);
    let summary = report.summary();
    if report.is_success() {
        info!("{summary}");
        println!("{}", summary.green().bold());
    } else {
        error!("{summary}");
        println!("{}", summary.red().bold());
    }
    ExitCode::from(report.exit_code())
}
