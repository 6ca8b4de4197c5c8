//! Appending key events to log files
//!
//! [`LogWriter`] owns one file and guards it with the header check in
//! [`LogWriter::open_or_create`]. [`Recorder`] is the capture-session view: a
//! single writer, or a table of writers keyed by device identity that is
//! filled lazily as new devices show up.

use crate::error::{LogError, Result};
use crate::format::{
    CaptureMode, FormatVersions, Header, Layout, Record, HEADER_LEN, MAX_RECORD_LEN,
};
use crate::keyboard::{DeviceId, KeyEvent};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Append handle for a single log file
#[derive(Debug)]
pub struct LogWriter {
    path: PathBuf,
    file: File,
    layout: Layout,
    records: u64,
}

impl LogWriter {
    /// Opens `path` for appending, writing a header if the file is new or
    /// empty. An existing header must match `version` and `layout` exactly,
    /// otherwise nothing is written and `FormatMismatch` is returned. A
    /// partial record at the end of a resumed file is cut off.
    pub fn open_or_create(path: impl AsRef<Path>, layout: Layout, version: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| LogError::io(&path, e))?;

        let len = file.metadata().map_err(|e| LogError::io(&path, e))?.len();
        if len == 0 {
            let header = Header::new(version, layout);
            file.write_all(&header.encode())
                .map_err(|e| LogError::io(&path, e))?;
            debug!("{}: new {} log", path.display(), layout.kind().name());
        } else {
            if len < HEADER_LEN as u64 {
                return Err(LogError::TruncatedHeader { path, len });
            }
            let mut buf = [0u8; HEADER_LEN];
            file.read_exact(&mut buf)
                .map_err(|e| LogError::io(&path, e))?;
            let existing = Header::decode(&buf, layout.kind())
                .and_then(|header| header.check(version, layout).map(|_| header));
            if let Err(mismatch) = existing {
                return Err(LogError::FormatMismatch { path, mismatch });
            }
            // New records must start on a record boundary; cut off a partial
            // record left by a killed session.
            let partial = (len - HEADER_LEN as u64) % layout.record_len() as u64;
            if partial != 0 {
                warn!(
                    "{}: dropping {} trailing bytes of a partial record",
                    path.display(),
                    partial
                );
                file.set_len(len - partial)
                    .map_err(|e| LogError::io(&path, e))?;
            }
            debug!("{}: resuming log ({} bytes)", path.display(), len - partial);
        }

        Ok(Self {
            path,
            file,
            layout,
            records: 0,
        })
    }

    /// Writes one record. The record reaches the file before this returns.
    pub fn append(&mut self, event: &KeyEvent) -> Result<()> {
        let record = self.record_for(event)?;
        let kind = self.layout.kind();
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = record.encode(kind, &mut buf);
        self.file
            .write_all(&buf[..len])
            .map_err(|e| LogError::io(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    fn record_for(&self, event: &KeyEvent) -> Result<Record> {
        match self.layout {
            Layout::Simple(mode) => {
                if event.pressed == Some(false) {
                    return Err(LogError::malformed(
                        "release events cannot be stored in a simple log",
                    ));
                }
                let code = u16::try_from(event.code).map_err(|_| {
                    LogError::malformed(format!(
                        "{} code {} does not fit in 16 bits",
                        mode, event.code
                    ))
                })?;
                Ok(Record {
                    timestamp: event.timestamp,
                    code,
                    pressed: true,
                })
            }
            Layout::PerDevice(device) => {
                if event.device_id != Some(device) {
                    return Err(LogError::malformed(format!(
                        "event from {:?} routed to log of device {}",
                        event.device_id, device
                    )));
                }
                let code = u8::try_from(event.code).map_err(|_| {
                    LogError::malformed(format!("scancode {} does not fit in 8 bits", event.code))
                })?;
                Ok(Record {
                    timestamp: event.timestamp,
                    code: u16::from(code),
                    pressed: event.is_press(),
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flushes file contents to disk and closes the handle.
    pub fn close(self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| LogError::io(&self.path, e))
    }
}

#[derive(Debug)]
enum Target {
    Single(LogWriter),
    PerDevice {
        dir: PathBuf,
        writers: HashMap<DeviceId, LogWriter>,
    },
}

/// Routes events of a capture session to their log file(s)
#[derive(Debug)]
pub struct Recorder {
    target: Target,
    version: u64,
}

impl Recorder {
    /// Records every event into one simple-layout file.
    pub fn single(path: impl AsRef<Path>, mode: CaptureMode, versions: FormatVersions) -> Result<Self> {
        let writer = LogWriter::open_or_create(path, Layout::Simple(mode), versions.write)?;
        info!(
            "recording {} codes to {}",
            mode,
            writer.path().display()
        );
        Ok(Self {
            target: Target::Single(writer),
            version: versions.write,
        })
    }

    /// Records scancode transitions into one file per device under `dir`.
    ///
    /// Files are named after the decimal device identity, so a later session
    /// with the same hardware appends to the same file.
    pub fn per_device(dir: impl AsRef<Path>, versions: FormatVersions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| LogError::io(&dir, e))?;
        info!("recording per-device logs under {}", dir.display());
        Ok(Self {
            target: Target::PerDevice {
                dir,
                writers: HashMap::new(),
            },
            version: versions.write,
        })
    }

    /// Appends one event, opening the device's file on first sight.
    pub fn append(&mut self, event: &KeyEvent) -> Result<()> {
        match &mut self.target {
            Target::Single(writer) => writer.append(event),
            Target::PerDevice { dir, writers } => {
                let device = event.device_id.ok_or_else(|| {
                    LogError::malformed("event without device identity in per-device capture")
                })?;
                let writer = match writers.entry(device) {
                    std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let path = device.log_path(dir);
                        let writer =
                            LogWriter::open_or_create(&path, Layout::PerDevice(device), self.version)?;
                        info!("device {}: logging to {}", device, path.display());
                        entry.insert(writer)
                    }
                };
                writer.append(event)
            }
        }
    }

    /// Paths of the files opened so far, in a stable order.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = match &self.target {
            Target::Single(writer) => vec![writer.path().to_path_buf()],
            Target::PerDevice { writers, .. } => {
                writers.values().map(|w| w.path().to_path_buf()).collect()
            }
        };
        paths.sort();
        paths
    }

    /// Records appended during this session across all files
    pub fn records(&self) -> u64 {
        match &self.target {
            Target::Single(writer) => writer.records(),
            Target::PerDevice { writers, .. } => writers.values().map(LogWriter::records).sum(),
        }
    }

    /// Flushes and closes every open file. Every handle is closed even if
    /// one of them fails; the first failure is returned.
    pub fn close(self) -> Result<()> {
        let writers: Vec<LogWriter> = match self.target {
            Target::Single(writer) => vec![writer],
            Target::PerDevice { writers, .. } => writers.into_values().collect(),
        };
        let mut first_err = None;
        for writer in writers {
            let path = writer.path().to_path_buf();
            let records = writer.records();
            match writer.close() {
                Ok(()) => debug!("{}: closed after {} records", path.display(), records),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
