//! Hardware identity of an input device

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Vendor and product identifiers packed as `(vendor << 32) | product`
///
/// Two physical units of the same model share an identity and therefore
/// share a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    pub fn new(vendor: u32, product: u32) -> Self {
        Self((u64::from(vendor) << 32) | u64::from(product))
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn vendor(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn product(&self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }

    /// Log file name for this device: the decimal identity.
    pub fn file_name(&self) -> String {
        self.0.to_string()
    }

    pub fn log_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Parses a per-device log file name back into an identity.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok().map(Self)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor(), self.product())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_vendor_high_product_low() {
        let id = DeviceId::new(0x046d, 0xc52b);
        assert_eq!(id.as_u64(), 0x0000_046d_0000_c52b);
        assert_eq!(id.vendor(), 0x046d);
        assert_eq!(id.product(), 0xc52b);
    }

    #[test]
    fn full_32_bit_halves_survive() {
        let id = DeviceId::new(0xdead_beef, 0x1234_5678);
        assert_eq!(id.vendor(), 0xdead_beef);
        assert_eq!(id.product(), 0x1234_5678);
    }

    #[test]
    fn file_name_is_decimal_and_stable() {
        let id = DeviceId::new(1, 2);
        assert_eq!(id.file_name(), "4294967298");
        assert_eq!(DeviceId::from_file_name(&id.file_name()), Some(id));
        assert_eq!(
            id.log_path(Path::new("/var/keys")),
            PathBuf::from("/var/keys/4294967298")
        );
    }

    #[test]
    fn rejects_non_decimal_names() {
        assert_eq!(DeviceId::from_file_name(""), None);
        assert_eq!(DeviceId::from_file_name("+12"), None);
        assert_eq!(DeviceId::from_file_name("keys.log"), None);
        assert_eq!(DeviceId::from_file_name("99999999999999999999999"), None);
    }

    #[test]
    fn display_is_hex_pair() {
        assert_eq!(DeviceId::new(0x46d, 0xc31c).to_string(), "046d:c31c");
    }
}
