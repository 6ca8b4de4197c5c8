//! keyfreq - keystroke capture and frequency reporting
//!
//! Key events are appended to a compact, versioned binary log (optionally one
//! log per input device) and later replayed to count how often each key was
//! pressed, optionally within a time window.
//!
//! ```no_run
//! use keyfreq::format::{CaptureMode, FormatVersions, LayoutKind};
//! use keyfreq::keyboard::KeyEvent;
//! use keyfreq::{Recorder, Reporter, TimeWindow};
//!
//! # fn main() -> keyfreq::Result<()> {
//! let mut recorder = Recorder::single("keys.log", CaptureMode::Character, FormatVersions::CURRENT)?;
//! recorder.append(&KeyEvent::character(1_700_000_000_000_000, u32::from('a')))?;
//! recorder.close()?;
//!
//! let mut reporter = Reporter::open("keys.log", LayoutKind::Simple, FormatVersions::CURRENT)?;
//! for (code, count) in reporter.counts(TimeWindow::default())? {
//!     println!("{}: {}", code, count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod format;
pub mod keyboard;
pub mod recorder;
pub mod report;
pub mod reporter;
pub mod window;

pub use config::Config;
pub use error::{LogError, Result};
pub use recorder::{LogWriter, Recorder};
pub use reporter::{KeyCounts, Reporter};
pub use window::TimeWindow;
