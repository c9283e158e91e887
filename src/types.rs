//! Data structures shared across the library.

use std::fmt;

/// Immutable identity of a discovered bed peripheral.
///
/// The platform connection handle is not part of the identity; the
/// transport owns it, keyed by [`address`](Self::address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BedDevice {
    /// Platform-assigned peripheral address.
    ///
    /// A Bluetooth MAC address (`AA:BB:CC:DD:EE:FF`) on Linux and Windows,
    /// a platform UUID string on macOS.
    pub address: String,
    /// Local name carried in the advertisement, if any.
    pub local_name: Option<String>,
}

impl BedDevice {
    /// Creates a new device identity.
    #[must_use]
    pub fn new(address: impl Into<String>, local_name: Option<String>) -> Self {
        Self {
            address: address.into(),
            local_name,
        }
    }
}

impl fmt::Display for BedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local_name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}
