//! On-disk key log format
//!
//! All integers are little-endian and fixed width. Two layouts exist and both
//! carry a 16 byte header:
//!
//! ```text
//! simple header:      | version u64 | mode u16 | reserved [u8; 6] |
//! simple record:      | timestamp i64 | code u16 |
//!
//! per-device header:  | version u64 | device_id u64 |
//! per-device record:  | timestamp i64 | scancode u8 | pressed u8 |
//! ```
//!
//! Records are packed back to back with no framing. Their boundaries follow
//! from the header width and the fixed record width of the layout, which is
//! what lets the reporter seek by whole records without an index.

use crate::keyboard::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of every header, in bytes
pub const HEADER_LEN: usize = 16;

/// Largest record width across layouts
pub const MAX_RECORD_LEN: usize = 10;

/// Version bounds for writing and reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersions {
    /// Version stamped into new files and required of resumed ones
    pub write: u64,
    /// Oldest version the reader accepts
    pub min_read: u64,
    /// Newest version the reader accepts
    pub max_read: u64,
}

impl FormatVersions {
    pub const CURRENT: Self = Self {
        write: 1,
        min_read: 1,
        max_read: 1,
    };

    pub fn supports(&self, version: u64) -> bool {
        (self.min_read..=self.max_read).contains(&version)
    }
}

impl Default for FormatVersions {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// What the `code` field of a simple-layout record means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Character produced by the keypress under the active layout
    #[default]
    Character,
    /// Physical key scancode, independent of layout
    Scancode,
}

impl CaptureMode {
    pub fn as_raw(self) -> u16 {
        match self {
            Self::Character => 0,
            Self::Scancode => 1,
        }
    }

    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Character),
            1 => Some(Self::Scancode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Scancode => "scancode",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "character" | "char" => Ok(Self::Character),
            "scancode" | "raw" => Ok(Self::Scancode),
            other => Err(format!(
                "unknown capture mode '{}' (expected 'character' or 'scancode')",
                other
            )),
        }
    }
}

/// Which of the two layouts a file uses, without the header payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Simple,
    PerDevice,
}

impl LayoutKind {
    pub fn record_len(self) -> usize {
        match self {
            // timestamp + code
            Self::Simple => 8 + 2,
            // timestamp + scancode + pressed
            Self::PerDevice => 8 + 1 + 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::PerDevice => "per-device",
        }
    }
}

/// Layout plus the selector the header binds the file to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Simple(CaptureMode),
    PerDevice(DeviceId),
}

impl Layout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::Simple(_) => LayoutKind::Simple,
            Self::PerDevice(_) => LayoutKind::PerDevice,
        }
    }

    pub fn record_len(&self) -> usize {
        self.kind().record_len()
    }
}

/// Reason an existing header disagrees with what was expected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Version { expected: u64, found: u64 },
    Mode { expected: CaptureMode, found: CaptureMode },
    Device { expected: DeviceId, found: DeviceId },
    Layout { expected: LayoutKind, found: LayoutKind },
    UnknownMode(u16),
    /// Reserved simple-header bytes are not zero
    Reserved,
    /// Per-device log whose file name is not a device identity
    Unnamed,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version { expected, found } => {
                write!(f, "version {}, expected {}", found, expected)
            }
            Self::Mode { expected, found } => {
                write!(f, "{} mode, expected {} mode", found, expected)
            }
            Self::Device { expected, found } => {
                write!(f, "device {}, expected device {}", found, expected)
            }
            Self::Layout { expected, found } => {
                write!(f, "{} layout, expected {} layout", found.name(), expected.name())
            }
            Self::UnknownMode(raw) => write!(f, "unknown mode {}", raw),
            Self::Reserved => write!(f, "reserved header bytes are set"),
            Self::Unnamed => write!(f, "file name is not a device identity"),
        }
    }
}

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u64,
    pub layout: Layout,
}

impl Header {
    pub fn new(version: u64, layout: Layout) -> Self {
        Self { version, layout }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..8].copy_from_slice(&self.version.to_le_bytes());
        match self.layout {
            Layout::Simple(mode) => {
                buf[8..10].copy_from_slice(&mode.as_raw().to_le_bytes());
            }
            Layout::PerDevice(device) => {
                buf[8..16].copy_from_slice(&device.as_u64().to_le_bytes());
            }
        }
        buf
    }

    /// Reads only the version field, which sits first in every layout.
    pub fn version_of(buf: &[u8; HEADER_LEN]) -> u64 {
        u64::from_le_bytes(le_array(&buf[..8]))
    }

    pub fn decode(buf: &[u8; HEADER_LEN], kind: LayoutKind) -> Result<Self, Mismatch> {
        let version = Self::version_of(buf);
        let layout = match kind {
            LayoutKind::Simple => {
                let raw = u16::from_le_bytes(le_array(&buf[8..10]));
                let mode = CaptureMode::from_raw(raw).ok_or(Mismatch::UnknownMode(raw))?;
                if buf[10..].iter().any(|&b| b != 0) {
                    return Err(Mismatch::Reserved);
                }
                Layout::Simple(mode)
            }
            LayoutKind::PerDevice => {
                Layout::PerDevice(DeviceId::from_u64(u64::from_le_bytes(le_array(&buf[8..16]))))
            }
        };
        Ok(Self { version, layout })
    }

    /// Checks that this header is exactly what a writer configured with
    /// `version` and `layout` would have produced.
    pub fn check(&self, version: u64, layout: Layout) -> Result<(), Mismatch> {
        if self.version != version {
            return Err(Mismatch::Version {
                expected: version,
                found: self.version,
            });
        }
        match (layout, self.layout) {
            (Layout::Simple(expected), Layout::Simple(found)) if expected != found => {
                Err(Mismatch::Mode { expected, found })
            }
            (Layout::PerDevice(expected), Layout::PerDevice(found)) if expected != found => {
                Err(Mismatch::Device { expected, found })
            }
            (expected, found) if expected.kind() != found.kind() => Err(Mismatch::Layout {
                expected: expected.kind(),
                found: found.kind(),
            }),
            _ => Ok(()),
        }
    }
}

/// One decoded body record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
    pub code: u16,
    /// Always true for simple-layout records
    pub pressed: bool,
}

impl Record {
    /// Encodes into `buf`, returning the number of bytes used.
    ///
    /// Per-device records hold a one byte scancode; callers validate the
    /// range before building the record.
    pub fn encode(&self, kind: LayoutKind, buf: &mut [u8; MAX_RECORD_LEN]) -> usize {
        buf[..8].copy_from_slice(&self.timestamp.to_le_bytes());
        match kind {
            LayoutKind::Simple => {
                buf[8..10].copy_from_slice(&self.code.to_le_bytes());
            }
            LayoutKind::PerDevice => {
                debug_assert!(self.code <= u16::from(u8::MAX));
                buf[8] = self.code as u8;
                buf[9] = u8::from(self.pressed);
            }
        }
        kind.record_len()
    }

    /// Decodes a full record; `buf` must be exactly one record wide.
    pub fn decode(buf: &[u8], kind: LayoutKind) -> Self {
        let timestamp = i64::from_le_bytes(le_array(&buf[..8]));
        match kind {
            LayoutKind::Simple => Self {
                timestamp,
                code: u16::from_le_bytes(le_array(&buf[8..10])),
                pressed: true,
            },
            LayoutKind::PerDevice => Self {
                timestamp,
                code: u16::from(buf[8]),
                pressed: buf[9] != 0,
            },
        }
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_header_layout_is_bit_exact() {
        let header = Header::new(1, Layout::Simple(CaptureMode::Scancode));
        assert_eq!(
            header.encode(),
            [1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn per_device_header_embeds_identity() {
        let device = DeviceId::new(0x046d, 0xc31c);
        let bytes = Header::new(1, Layout::PerDevice(device)).encode();
        assert_eq!(&bytes[8..16], &device.as_u64().to_le_bytes());

        let decoded = Header::decode(&bytes, LayoutKind::PerDevice).unwrap();
        assert_eq!(decoded.layout, Layout::PerDevice(device));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let mut bytes = Header::new(1, Layout::Simple(CaptureMode::Character)).encode();
        bytes[8] = 9;
        assert_eq!(
            Header::decode(&bytes, LayoutKind::Simple),
            Err(Mismatch::UnknownMode(9))
        );
    }

    #[test]
    fn per_device_header_is_not_a_simple_header() {
        let device = DeviceId::new(0x046d, 0x0001);
        let bytes = Header::new(1, Layout::PerDevice(device)).encode();
        // The product reads as mode 1 and the vendor lands in the reserved
        // bytes.
        assert_eq!(
            Header::decode(&bytes, LayoutKind::Simple),
            Err(Mismatch::Reserved)
        );
    }

    #[test]
    fn check_reports_first_difference() {
        let header = Header::new(1, Layout::Simple(CaptureMode::Character));
        assert!(header.check(1, Layout::Simple(CaptureMode::Character)).is_ok());
        assert_eq!(
            header.check(2, Layout::Simple(CaptureMode::Scancode)),
            Err(Mismatch::Version {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            header.check(1, Layout::Simple(CaptureMode::Scancode)),
            Err(Mismatch::Mode {
                expected: CaptureMode::Scancode,
                found: CaptureMode::Character
            })
        );
    }

    #[test]
    fn check_rejects_other_device() {
        let a = DeviceId::new(1, 2);
        let b = DeviceId::new(1, 3);
        let header = Header::new(1, Layout::PerDevice(a));
        assert_eq!(
            header.check(1, Layout::PerDevice(b)),
            Err(Mismatch::Device {
                expected: b,
                found: a
            })
        );
    }

    #[test]
    fn simple_record_bytes() {
        let record = Record {
            timestamp: 0x0102,
            code: 0x0061,
            pressed: true,
        };
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = record.encode(LayoutKind::Simple, &mut buf);
        assert_eq!(len, 10);
        assert_eq!(buf, [0x02, 0x01, 0, 0, 0, 0, 0, 0, 0x61, 0x00]);
    }

    #[test]
    fn per_device_record_keeps_release_flag() {
        let record = Record {
            timestamp: -5,
            code: 30,
            pressed: false,
        };
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = record.encode(LayoutKind::PerDevice, &mut buf);
        assert_eq!(buf[8], 30);
        assert_eq!(buf[9], 0);
        assert_eq!(Record::decode(&buf[..len], LayoutKind::PerDevice), record);
    }

    #[test]
    fn nonzero_pressed_byte_counts_as_press() {
        let mut buf = [0u8; 10];
        buf[8] = 4;
        buf[9] = 0xff;
        assert!(Record::decode(&buf, LayoutKind::PerDevice).pressed);
    }

    #[test]
    fn capture_mode_parsing() {
        assert_eq!("Scancode".parse::<CaptureMode>(), Ok(CaptureMode::Scancode));
        assert_eq!("char".parse::<CaptureMode>(), Ok(CaptureMode::Character));
        assert!("unicode".parse::<CaptureMode>().is_err());
        assert_eq!(CaptureMode::from_raw(1), Some(CaptureMode::Scancode));
        assert_eq!(CaptureMode::from_raw(2), None);
    }

    #[test]
    fn version_range() {
        let versions = FormatVersions {
            write: 2,
            min_read: 2,
            max_read: 3,
        };
        assert!(!versions.supports(1));
        assert!(versions.supports(2));
        assert!(versions.supports(3));
        assert!(!versions.supports(4));
    }
}
