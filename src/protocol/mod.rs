//! Protocol definitions for SUTA bed communication.
//!
//! This module contains the GATT identifiers exposed by the bed and the
//! command table written to its control characteristic. The bed does not
//! advertise a usable service UUID, so discovery goes by the advertised
//! local name instead.

pub mod command;

use uuid::{Uuid, uuid};

pub use command::BedCommand;

/// Local name the bed carries in its advertisements.
///
/// Name equality is the only discovery discriminator available for this
/// hardware; matching is exact, never prefix or substring.
pub const BED_LOCAL_NAME: &str = "QRRM104150";

/// Service that accepts bed control commands.
pub const CONTROL_SERVICE: Uuid = uuid!("0000fee9-0000-1000-8000-00805f9b34fb");

/// Acknowledgement service. Purpose unknown.
pub const ACK_SERVICE: Uuid = uuid!("0000ffe0-0000-1000-8000-00805f9b34fb");

/// Firmware update service. Leave alone.
pub const UPDATE_SERVICE: Uuid = uuid!("00010203-0405-0607-0809-0a0b0c0d1912");

/// Control characteristic commands are written to (write).
pub const CONTROL_COMMAND_CHARACTERISTIC: Uuid = uuid!("d44bc439-abfd-45a2-b575-925416129600");

/// Current bed state (notify).
pub const CONTROL_STATE_CHARACTERISTIC: Uuid = uuid!("d44bc439-abfd-45a2-b575-925416129601");

/// "ACK OutPut" (notify).
pub const ACK_OUTPUT_CHARACTERISTIC: Uuid = uuid!("0000ffe1-0000-1000-8000-00805f9b34fb");

/// "CMD Input" (write).
pub const ACK_INPUT_CHARACTERISTIC: Uuid = uuid!("0000ffe2-0000-1000-8000-00805f9b34fb");

/// OTA firmware endpoint (write). Writing here can brick the bed.
pub const UPDATE_OTA_CHARACTERISTIC: Uuid = uuid!("00010203-0405-0607-0809-0a0b0c0d2b12");
