//! keyfreq-report - count key presses in a binary log

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::path::PathBuf;

use keyfreq::format::{FormatVersions, LayoutKind};
use keyfreq::report::FrequencyReport;
use keyfreq::{Config, Reporter, TimeWindow};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "keyfreq-report")]
#[command(about = "Print per-key press counts from a keyfreq log")]
struct Args {
    /// Log file to read
    input: PathBuf,

    /// Only count events at or after this time (RFC 3339, or local date/time)
    #[arg(long)]
    begin: Option<String>,

    /// Only count events at or before this time
    #[arg(long)]
    end: Option<String>,

    /// The input is a per-device log
    #[arg(long)]
    per_device: bool,

    /// Print key names next to codes
    #[arg(short, long)]
    names: bool,

    /// Also write the report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("ignoring config file: {}", e);
            Config::default()
        }),
    };

    let window = TimeWindow::parse(args.begin.as_deref(), args.end.as_deref())?;
    let kind = if args.per_device || config.report.per_device {
        LayoutKind::PerDevice
    } else {
        LayoutKind::Simple
    };

    let mut reporter = Reporter::open(&args.input, kind, FormatVersions::CURRENT)?;
    if let Some(device) = reporter.device() {
        eprintln!("Vendor ID: {}", device.vendor());
        eprintln!("Product ID: {}", device.product());
    }
    let counts = reporter
        .counts(window)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let report = FrequencyReport::new(&args.input, reporter.header(), window, &counts);
    print!("{}", report.to_text(args.names || config.report.show_names));

    if let Some(path) = &args.json {
        report
            .export_json(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
