//! Reading a key log back into per-key counts

use crate::error::{LogError, Result};
use crate::format::{
    FormatVersions, Header, Layout, LayoutKind, Mismatch, Record, HEADER_LEN, MAX_RECORD_LEN,
};
use crate::keyboard::DeviceId;
use crate::window::TimeWindow;
use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Occurrences per key code, in ascending code order
pub type KeyCounts = BTreeMap<u16, u64>;

/// Sequential reader over one log file
pub struct Reporter {
    path: PathBuf,
    reader: BufReader<File>,
    header: Header,
}

impl Reporter {
    /// Opens `path` and validates its header. `kind` says which layout the
    /// file was written with; the header alone cannot tell them apart.
    ///
    /// A per-device log must be named after the identity in its header.
    pub fn open(path: impl AsRef<Path>, kind: LayoutKind, versions: FormatVersions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| LogError::io(&path, e))?;
        let len = file.metadata().map_err(|e| LogError::io(&path, e))?.len();
        if len < HEADER_LEN as u64 {
            return Err(LogError::TruncatedHeader { path, len });
        }

        let mut reader = BufReader::new(file);
        let mut buf = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut buf)
            .map_err(|e| LogError::io(&path, e))?;

        let version = Header::version_of(&buf);
        if !versions.supports(version) {
            return Err(LogError::InvalidVersion {
                path,
                found: version,
                min: versions.min_read,
                max: versions.max_read,
            });
        }
        let header = match Header::decode(&buf, kind) {
            Ok(header) => header,
            Err(mismatch) => return Err(LogError::FormatMismatch { path, mismatch }),
        };
        if let Layout::PerDevice(found) = header.layout {
            let named = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(DeviceId::from_file_name);
            let mismatch = match named {
                Some(expected) if expected == found => None,
                Some(expected) => Some(Mismatch::Device { expected, found }),
                None => Some(Mismatch::Unnamed),
            };
            if let Some(mismatch) = mismatch {
                return Err(LogError::FormatMismatch { path, mismatch });
            }
        }
        debug!("{}: version {} {} log", path.display(), version, kind.name());

        Ok(Self {
            path,
            reader,
            header,
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Device the file is bound to, for per-device logs
    pub fn device(&self) -> Option<DeviceId> {
        match self.header.layout {
            Layout::PerDevice(device) => Some(device),
            Layout::Simple(_) => None,
        }
    }

    fn kind(&self) -> LayoutKind {
        self.header.layout.kind()
    }

    /// Positions the reader at the first record with `timestamp >= begin`,
    /// or at the first record when `begin` is `None`.
    ///
    /// Timestamps are only weakly ordered, so this walks forward record by
    /// record rather than bisecting.
    pub fn seek_to_start_of_window(&mut self, begin: Option<i64>) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(HEADER_LEN as u64))
            .map_err(|e| LogError::io(&self.path, e))?;
        let Some(begin) = begin else {
            return Ok(());
        };

        let width = self.kind().record_len() as i64;
        while let Some(record) = self.next_record()? {
            if record.timestamp >= begin {
                self.reader
                    .seek_relative(-width)
                    .map_err(|e| LogError::io(&self.path, e))?;
                break;
            }
        }
        Ok(())
    }

    /// Counts records from the current position until end of file, or until
    /// a record newer than `end`. Per-device logs only count presses.
    pub fn aggregate(&mut self, end: Option<i64>) -> Result<KeyCounts> {
        let mut counts = KeyCounts::new();
        while let Some(record) = self.next_record()? {
            if end.is_some_and(|end| record.timestamp > end) {
                break;
            }
            if record.pressed {
                *counts.entry(record.code).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Counts the records inside `window`.
    pub fn counts(&mut self, window: TimeWindow) -> Result<KeyCounts> {
        self.seek_to_start_of_window(window.begin)?;
        self.aggregate(window.end)
    }

    /// Reads the next full record. A trailing partial record reads as end of
    /// data.
    fn next_record(&mut self) -> Result<Option<Record>> {
        let width = self.kind().record_len();
        let mut buf = [0u8; MAX_RECORD_LEN];
        let mut filled = 0;
        while filled < width {
            match self.reader.read(&mut buf[filled..width]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LogError::io(&self.path, e)),
            }
        }
        if filled < width {
            if filled > 0 {
                debug!(
                    "{}: ignoring {} trailing bytes of a partial record",
                    self.path.display(),
                    filled
                );
            }
            return Ok(None);
        }
        Ok(Some(Record::decode(&buf[..width], self.kind())))
    }
}
