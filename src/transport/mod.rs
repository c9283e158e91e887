//! Transport layer for BLE communication.
//!
//! This module provides the abstraction over the platform BLE stack.
//! The core never touches the stack directly: it consumes the event
//! stream and calls the connection and write primitives declared here,
//! keyed by peripheral address.

pub mod btleplug;

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::types::BedDevice;

/// Events reported by the transport while scanning is active.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An advertisement was received from a peripheral.
    Discovered(BedDevice),
    /// The transport reported a connection loss for a peripheral.
    Disconnected {
        /// Address of the peripheral that dropped.
        address: String,
    },
}

/// Trait for BLE transport implementations.
///
/// Methods take `&self`: operations against different peripherals may run
/// concurrently, and any serialization the shared radio needs is the
/// transport's concern.
pub trait BleTransport: Send + Sync {
    /// Starts advertisement scanning.
    ///
    /// Advertisements and disconnects are delivered through the receiver
    /// returned by [`take_events`](Self::take_events).
    fn start_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stops advertisement scanning.
    fn stop_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Takes the transport event receiver.
    ///
    /// This can only be taken once.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Connects to a previously discovered peripheral.
    ///
    /// Implementations own retry, backoff, and timeout policy.
    fn connect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Disconnects from a peripheral.
    fn disconnect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Writes a payload to a characteristic of a connected peripheral.
    fn write<'a>(
        &'a self,
        address: &'a str,
        characteristic: Uuid,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Returns true if the peripheral is currently connected.
    fn is_connected<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

pub use self::btleplug::{BtleplugConfig, BtleplugTransport};
