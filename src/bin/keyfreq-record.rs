//! keyfreq-record - capture keystrokes to a binary log
//!
//! Runs until interrupted; every open log is flushed and closed on Ctrl+C.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::mpsc;

use keyfreq::capture::{spawn_source, CaptureSession, StopFlag};
use keyfreq::format::{CaptureMode, FormatVersions};
use keyfreq::keyboard::{KeyEvent, KeySource, KeyboardListener};
use keyfreq::{Config, Recorder};

#[cfg(target_os = "linux")]
use keyfreq::keyboard::EvdevListener;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "keyfreq-record")]
#[command(about = "Record keystrokes to a compact binary log")]
struct Args {
    /// Log file to append to (simple capture)
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory for one log per keyboard (enables per-device capture)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// What to record: 'character' or 'scancode'
    #[arg(short, long)]
    mode: Option<CaptureMode>,

    /// Split scancode transitions into one log per device
    #[arg(long)]
    per_device: bool,

    /// Poll global key state instead of reading input devices
    #[arg(long)]
    polling: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store the effective capture settings in the config file
    #[arg(long)]
    save_config: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::load().unwrap_or_else(|e| {
            warn!("ignoring config file: {}", e);
            Config::default()
        })),
    }
}

/// Opens the best available key source on the current thread.
fn open_source(
    tx: mpsc::SyncSender<KeyEvent>,
    mode: CaptureMode,
    per_device: bool,
    polling: bool,
) -> std::io::Result<Box<dyn KeySource>> {
    #[cfg(target_os = "linux")]
    {
        if !polling {
            match EvdevListener::new(tx.clone(), mode, per_device) {
                Ok(listener) => return Ok(Box::new(listener)),
                Err(e) if per_device => return Err(std::io::Error::other(e.to_string())),
                Err(e) => warn!("evdev unavailable ({}), falling back to polling", e),
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = polling;

    if per_device {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "per-device capture needs direct device access",
        ));
    }
    Ok(Box::new(KeyboardListener::new(tx, mode)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_ref())?;

    let per_device = args.per_device || args.output_dir.is_some() || config.capture.per_device;
    let mut mode = args.mode.unwrap_or(config.capture.mode);
    if per_device && mode == CaptureMode::Character {
        if args.mode.is_some() {
            bail!("per-device capture records scancodes; drop --mode character");
        }
        info!("per-device capture records scancodes");
        mode = CaptureMode::Scancode;
    }

    if args.save_config {
        config.capture.mode = mode;
        config.capture.per_device = per_device;
        if args.output.is_some() {
            config.capture.output = args.output.clone();
        }
        if args.output_dir.is_some() {
            config.capture.output_dir = args.output_dir.clone();
        }
        match &args.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        }
        .context("failed to save config")?;
        info!("capture settings saved");
    }
    let capture = &config.capture;

    let recorder = if per_device {
        let dir = match args.output_dir {
            Some(dir) => dir,
            None => capture.output_dir_path()?,
        };
        Recorder::per_device(&dir, FormatVersions::CURRENT)
    } else {
        let path = match args.output {
            Some(path) => path,
            None => capture.output_path()?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Recorder::single(&path, mode, FormatVersions::CURRENT)
    }
    .context("cannot open output")?;

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop()).context("failed to install signal handler")?;
    }

    let (tx, rx) = mpsc::sync_channel::<KeyEvent>(capture.queue_capacity.max(1));
    let polling = args.polling;
    let source = spawn_source(
        move || open_source(tx, mode, per_device, polling),
        stop.clone(),
        capture.poll_interval(),
    );

    let result = CaptureSession::new(recorder, rx, stop.clone()).run();
    stop.stop();
    let source_result = source.join();

    let summary = result.context("capture failed")?;
    match source_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => bail!("key source failed: {}", e),
        Err(_) => bail!("key source thread panicked"),
    }

    println!("Recorded {} events", summary.events);
    for file in &summary.files {
        println!("  {}", file.display());
    }
    Ok(())
}
