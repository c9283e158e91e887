//! Error types for the suta-bed library.

use thiserror::Error;

/// The main error type for suta-bed operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bluetooth stack error.
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available.
    #[error("no bluetooth adapter found")]
    NoAdapter,

    /// Action name outside the command table.
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },

    /// Connect attempt exhausted the transport's retries or timed out.
    #[error("failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// Write to the control characteristic failed.
    #[error("command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// Required GATT characteristic is missing from the connected device.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: uuid::Uuid },

    /// Connecting requires the discovery scan to be active.
    #[error("cannot connect while the discovery scan is stopped")]
    ScanInactive,

    /// Discovery matched zero or more than one bed where exactly one
    /// was expected.
    #[error("discovery matched {count} beds where exactly one was expected")]
    AmbiguousSelection { count: usize },

    /// The discovery or event stream has ended.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type alias for suta-bed operations.
pub type Result<T> = std::result::Result<T, Error>;
