#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nxgpu_backend::LoopbackBackend;
use nxgpu_conformance::{builtin_tests, run_compute_tests, wait_for_enter, RunConfig, RunReport};
use tracing_subscriber::EnvFilter;

/// Failure details land here, one line per failing test.
const ERROR_FILE: &str = "nxgputests_error.txt";

#[derive(Debug, Parser)]
#[command(about = "Compute conformance harness for DKSH shader containers")]
struct Args {
    /// Run without interactive pauses (batch/CI mode).
    #[arg(long)]
    automatic: bool,

    /// Only run tests whose name contains this substring (case-insensitive).
    #[arg(long)]
    filter: Option<String>,

    /// Write the aggregate JSON report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write one JSON file per executed test into this directory.
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = RunConfig {
        automatic: args.automatic,
        filter: args.filter,
        report_path: args.report,
        case_report_dir: args.report_dir,
    };

    let mut backend = LoopbackBackend::new();
    let report = run_compute_tests(&mut backend, builtin_tests(), &config)
        .context("compute test run failed")?;

    write_error_file(&report).with_context(|| format!("failed to write {ERROR_FILE}"))?;

    if !config.automatic {
        wait_for_enter("\nPress Enter to exit...")?;
    }

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn write_error_file(report: &RunReport) -> std::io::Result<()> {
    let mut out = String::new();
    for detail in &report.failure_details {
        out.push_str(detail);
        out.push('\n');
    }
    std::fs::write(ERROR_FILE, out)
}
