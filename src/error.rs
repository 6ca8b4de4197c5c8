//! Error types shared by the recorder and reporter

use crate::format::Mismatch;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing or reading a key log
#[derive(Debug, Error)]
pub enum LogError {
    /// Existing file encodes a different version, mode or device
    #[error("{}: existing data has a different format ({mismatch})", path.display())]
    FormatMismatch { path: PathBuf, mismatch: Mismatch },

    /// File version is outside the range this reader implements
    #[error("{}: cannot read version {found} (supported {min}..={max})", path.display())]
    InvalidVersion {
        path: PathBuf,
        found: u64,
        min: u64,
        max: u64,
    },

    /// File is non-empty but too short to hold a header
    #[error("{}: header truncated ({len} bytes)", path.display())]
    TruncatedHeader { path: PathBuf, len: u64 },

    /// Open, read or write failed at the OS level
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Event or field outside its representable range
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }
}

pub type Result<T, E = LogError> = std::result::Result<T, E>;
