//! Command table for the bed's control characteristic.
//!
//! Each command is a fixed 5-byte opcode, written big-endian to
//! [`CONTROL_COMMAND_CHARACTERISTIC`](super::CONTROL_COMMAND_CHARACTERISTIC).
//! The values were reverse engineered from vendor app traffic; the bed has
//! no absolute-position API, so each write moves the actuators one notch.

use crate::error::{Error, Result};

/// Commands accepted by the bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum BedCommand {
    /// Raise the head a notch.
    HeadUp = 0x6e_0100_2493,
    /// Lower the head a notch.
    HeadDown = 0x6e_0100_2594,
    /// Raise the feet a notch.
    FeetUp = 0x6e_0100_2695,
    /// Lower the feet a notch.
    FeetDown = 0x6e_0100_2796,

    /// Lower head and feet together.
    HeadAndFeetDown = 0x6e_0100_2998,
    /// Raise head and feet together.
    HeadAndFeetUp = 0x6e_0100_2a99,

    /// Reserved. The bed answers with three beeps; the reverse-engineering
    /// notes suggest an illegal-command response, unverified.
    ThreeBeep1 = 0x6e_0100_2b9a,
    /// Reserved, see [`ThreeBeep1`](Self::ThreeBeep1).
    ThreeBeep2 = 0x6e_0100_2c9b,
    /// Reserved, see [`ThreeBeep1`](Self::ThreeBeep1).
    ThreeBeep3 = 0x6e_0100_2d9c,

    /// Move to the lounge preset.
    Lounge = 0x6e_0100_2e9d,
    // An alternate lounge opcode 0x6e_0100_2f9e appears in the
    // reverse-engineering notes; its effect is unconfirmed.
    /// Return to flat.
    Flat = 0x6e_0100_31a0,

    /// Run the head vibration motor.
    VibrateHead = 0x6e_0100_32a1,
    /// Run the feet vibration motor.
    VibrateFeet = 0x6e_0100_33a2,

    /// Toggle the under-bed light.
    Light = 0x6e_0100_3cab,

    /// Move to the zero-gravity preset.
    ZeroGravity = 0x6e_0100_45b4,
}

impl BedCommand {
    /// Every command in the table.
    pub const ALL: [Self; 15] = [
        Self::HeadUp,
        Self::HeadDown,
        Self::FeetUp,
        Self::FeetDown,
        Self::HeadAndFeetDown,
        Self::HeadAndFeetUp,
        Self::ThreeBeep1,
        Self::ThreeBeep2,
        Self::ThreeBeep3,
        Self::Lounge,
        Self::Flat,
        Self::VibrateHead,
        Self::VibrateFeet,
        Self::Light,
        Self::ZeroGravity,
    ];

    /// Returns the raw opcode value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self as u64
    }

    /// Returns the 5-byte big-endian payload written to the bed.
    #[must_use]
    pub const fn opcode(self) -> [u8; 5] {
        let bytes = self.raw().to_be_bytes();
        [bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
    }

    /// Returns the symbolic name of this command.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HeadUp => "head-up",
            Self::HeadDown => "head-down",
            Self::FeetUp => "feet-up",
            Self::FeetDown => "feet-down",
            Self::HeadAndFeetDown => "head-and-feet-down",
            Self::HeadAndFeetUp => "head-and-feet-up",
            Self::ThreeBeep1 => "three-beep-1",
            Self::ThreeBeep2 => "three-beep-2",
            Self::ThreeBeep3 => "three-beep-3",
            Self::Lounge => "lounge",
            Self::Flat => "flat",
            Self::VibrateHead => "vibrate-head",
            Self::VibrateFeet => "vibrate-feet",
            Self::Light => "light",
            Self::ZeroGravity => "zero-gravity",
        }
    }

    /// Looks up a command by its symbolic name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for names outside the table.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == name)
            .ok_or_else(|| Error::UnknownCommand {
                name: name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(BedCommand::HeadUp.raw(), 0x6e_0100_2493);
        assert_eq!(BedCommand::HeadDown.raw(), 0x6e_0100_2594);
        assert_eq!(BedCommand::FeetUp.raw(), 0x6e_0100_2695);
        assert_eq!(BedCommand::FeetDown.raw(), 0x6e_0100_2796);
        assert_eq!(BedCommand::Flat.raw(), 0x6e_0100_31a0);
        assert_eq!(BedCommand::ZeroGravity.raw(), 0x6e_0100_45b4);
    }

    #[test]
    fn test_opcode_payload_is_big_endian() {
        assert_eq!(BedCommand::HeadUp.opcode(), [0x6e, 0x01, 0x00, 0x24, 0x93]);
        assert_eq!(
            BedCommand::HeadDown.opcode(),
            [0x6e, 0x01, 0x00, 0x25, 0x94]
        );
        assert_eq!(BedCommand::Flat.opcode(), [0x6e, 0x01, 0x00, 0x31, 0xa0]);
    }

    #[test]
    fn test_opcodes_are_distinct() {
        let opcodes: HashSet<[u8; 5]> = BedCommand::ALL.into_iter().map(BedCommand::opcode).collect();
        assert_eq!(opcodes.len(), BedCommand::ALL.len());
    }

    #[test]
    fn test_name_round_trip() {
        for command in BedCommand::ALL {
            assert_eq!(BedCommand::from_name(command.name()).unwrap(), command);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = BedCommand::from_name("self-destruct").unwrap_err();
        assert!(matches!(err, Error::UnknownCommand { name } if name == "self-destruct"));
    }
}
