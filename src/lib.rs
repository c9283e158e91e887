//! # suta-bed
//!
//! A Rust client library for SUTA BLE adjustable bed frames, such as the
//! i500 or i800 (also sold under the Sleep Motion brand).
//!
//! The library scans for advertising beds, surfaces them as a live
//! stream, and sends movement commands over GATT: raise or lower the
//! head and feet, flatten, zero gravity, vibration motors, the under-bed
//! light.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Live discovery stream of matching beds
//! - Lazy, coalesced connection establishment with serialized writes
//! - Transparent reconnect after unexpected disconnects
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use suta_bed::{BedController, BtleplugTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), suta_bed::Error> {
//!     let transport = Arc::new(BtleplugTransport::with_defaults().await?);
//!     let mut controller = BedController::new(transport);
//!     controller.start().await?;
//!
//!     // Pick the one bed discovered within ten seconds.
//!     let mut devices = controller.devices().expect("stream already taken");
//!     let bed = devices.select(None, Duration::from_secs(10)).await?;
//!
//!     bed.raise_head().await?;
//!     bed.raise_feet().await?;
//!
//!     controller.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! Not sure whether your bed is compatible? Inspect it with a generic
//! GATT browser: if it exposes a service whose UUID starts with `FEE9`,
//! it probably is.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - GATT identifiers and the command table
//! - [`types`] - The discovered-device identity type
//! - [`transport`] - The BLE transport seam and its btleplug binding
//! - [`discovery`] - Advertisement filter and the discovery stream
//! - [`session`] - Per-bed command API and connection management
//! - [`controller`] - Scan lifecycle and session registry

pub mod controller;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use controller::BedController;
pub use discovery::{DeviceStream, is_supported_bed};
pub use error::{Error, Result};
pub use protocol::{BED_LOCAL_NAME, BedCommand};
pub use session::BedSession;
pub use transport::{BleTransport, BtleplugConfig, BtleplugTransport, TransportEvent};
pub use types::BedDevice;
