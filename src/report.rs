//! Frequency report rendering and export

use crate::format::{CaptureMode, Header, Layout};
use crate::keyboard::keymap::{character_label, scancode_label};
use crate::reporter::KeyCounts;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete frequency report for one log file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyReport {
    pub metadata: ReportMetadata,
    pub log: LogDescription,
    pub window: WindowDescription,
    pub summary: ReportSummary,
    pub keys: Vec<KeyEntry>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Log file the counts were read from
    pub source: String,
}

/// What the header of the source log says
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDescription {
    pub format_version: u64,
    pub layout: String,
    pub capture_mode: String,
    pub vendor_id: Option<u32>,
    pub product_id: Option<u32>,
}

/// Window bounds as RFC 3339 text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDescription {
    pub begin: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_keystrokes: u64,
    pub distinct_keys: usize,
}

/// Count for a single key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEntry {
    pub code: u16,
    pub label: String,
    pub count: u64,
}

fn micros_to_rfc3339(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| micros.to_string())
}

impl FrequencyReport {
    pub fn new(source: &Path, header: Header, window: TimeWindow, counts: &KeyCounts) -> Self {
        let (layout, mode, device) = match header.layout {
            Layout::Simple(mode) => ("simple", mode, None),
            Layout::PerDevice(device) => ("per-device", CaptureMode::Scancode, Some(device)),
        };
        let label = |code: u16| match mode {
            CaptureMode::Character => character_label(code),
            CaptureMode::Scancode => scancode_label(code),
        };

        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                source: source.display().to_string(),
            },
            log: LogDescription {
                format_version: header.version,
                layout: layout.to_string(),
                capture_mode: mode.to_string(),
                vendor_id: device.map(|d| d.vendor()),
                product_id: device.map(|d| d.product()),
            },
            window: WindowDescription {
                begin: window.begin.map(micros_to_rfc3339),
                end: window.end.map(micros_to_rfc3339),
            },
            summary: ReportSummary {
                total_keystrokes: counts.values().sum(),
                distinct_keys: counts.len(),
            },
            keys: counts
                .iter()
                .map(|(&code, &count)| KeyEntry {
                    code,
                    label: label(code),
                    count,
                })
                .collect(),
        }
    }

    /// One `code: count` line per key in ascending code order, optionally
    /// with the key's label as `code (label): count`.
    pub fn to_text(&self, show_names: bool) -> String {
        let mut out = String::new();
        for entry in &self.keys {
            if show_names {
                out.push_str(&format!("{} ({}): {}\n", entry.code, entry.label, entry.count));
            } else {
                out.push_str(&format!("{}: {}\n", entry.code, entry.count));
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::DeviceId;

    fn counts() -> KeyCounts {
        KeyCounts::from([(30, 3), (97, 1), (2, 5)])
    }

    #[test]
    fn text_lines_sorted_by_code() {
        let header = Header::new(1, Layout::Simple(CaptureMode::Scancode));
        let report = FrequencyReport::new(Path::new("k.log"), header, TimeWindow::default(), &counts());
        assert_eq!(report.to_text(false), "2: 5\n30: 3\n97: 1\n");
        assert_eq!(report.summary.total_keystrokes, 9);
        assert_eq!(report.summary.distinct_keys, 3);
    }

    #[test]
    fn names_follow_capture_mode() {
        let scancodes = FrequencyReport::new(
            Path::new("k.log"),
            Header::new(1, Layout::Simple(CaptureMode::Scancode)),
            TimeWindow::default(),
            &counts(),
        );
        assert!(scancodes.to_text(true).contains("30 (A): 3\n"));

        let characters = FrequencyReport::new(
            Path::new("k.log"),
            Header::new(1, Layout::Simple(CaptureMode::Character)),
            TimeWindow::default(),
            &counts(),
        );
        assert!(characters.to_text(true).contains("97 (a): 1\n"));
    }

    #[test]
    fn per_device_report_describes_device() {
        let device = DeviceId::new(0x046d, 0xc31c);
        let report = FrequencyReport::new(
            Path::new("1"),
            Header::new(1, Layout::PerDevice(device)),
            TimeWindow::new(Some(0), Some(1_000_000)).unwrap(),
            &counts(),
        );
        assert_eq!(report.log.vendor_id, Some(0x046d));
        assert_eq!(report.log.product_id, Some(0xc31c));
        assert_eq!(report.log.layout, "per-device");
        assert_eq!(report.window.begin.as_deref(), Some("1970-01-01T00:00:00+00:00"));

        let json = report.to_json().expect("JSON serialization failed");
        assert!(json.contains("\"vendor_id\": 1133"));
        assert!(json.contains("\"total_keystrokes\": 9"));
    }

    #[test]
    fn export_writes_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = FrequencyReport::new(
            Path::new("k.log"),
            Header::new(1, Layout::Simple(CaptureMode::Character)),
            TimeWindow::default(),
            &counts(),
        );
        report.export_json(&path).unwrap();
        let parsed: FrequencyReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.keys, report.keys);
    }
}
