//! Loconet opcodes and message length rules.
//!
//! Every message starts with an opcode byte whose top bit is set. Bits 5 and
//! 6 of the opcode select the length class:
//!
//! | Bits 6,5 | Range | Length |
//! |----------|-------|--------|
//! | `00` | `0x80..=0x9F` | 2 |
//! | `01` | `0xA0..=0xBF` | 4 |
//! | `10` | `0xC0..=0xDF` | 6 |
//! | `11` | `0xE0..=0xFF` | next byte |
//!
//! Lengths always count the opcode and the trailing checksum.

use crate::error::{Error, Result};

/// Bus busy.
pub const OPC_BUSY: u8 = 0x81;
/// Global power off.
pub const OPC_GPOFF: u8 = 0x82;
/// Global power on.
pub const OPC_GPON: u8 = 0x83;
/// Force idle (broadcast emergency stop).
pub const OPC_IDLE: u8 = 0x85;

/// Set slot speed.
pub const OPC_LOCO_SPD: u8 = 0xA0;
/// Set slot direction and F0-F4.
pub const OPC_LOCO_DIRF: u8 = 0xA1;
/// Set slot F5-F8.
pub const OPC_LOCO_SND: u8 = 0xA2;
/// Vendor function group (F9-F12 on some throttles).
pub const OPC_VENDOR_A3: u8 = 0xA3;
/// Long acknowledge; carries the NAK/ACK result code.
pub const OPC_LONG_ACK: u8 = 0xB4;
/// Write slot status byte.
pub const OPC_SLOT_STAT1: u8 = 0xB5;
/// Move slot data from source to destination.
pub const OPC_MOVE_SLOTS: u8 = 0xBA;
/// Request slot data.
pub const OPC_RQ_SL_DATA: u8 = 0xBB;
/// Request a slot for a locomotive address.
pub const OPC_LOCO_ADR: u8 = 0xBF;

/// Undocumented vendor extension.
pub const OPC_VENDOR_D4: u8 = 0xD4;
/// Undocumented vendor extension.
pub const OPC_VENDOR_E6: u8 = 0xE6;
/// Slot read data (reply to slot requests).
pub const OPC_SL_RD_DATA: u8 = 0xE7;
/// Write slot data.
pub const OPC_WR_SL_DATA: u8 = 0xEF;

/// Result code carried by every NAK this engine sends.
pub const NAK_CODE: u8 = 0x00;

/// Longest message this engine emits.
pub const MAX_MESSAGE_LEN: usize = 14;

/// How the total length of an inbound message is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthClass {
    /// Length known from the opcode alone.
    Fixed(usize),
    /// Length carried by the byte after the opcode.
    Explicit,
}

/// Returns `true` when `byte` can start a message.
#[inline]
pub const fn is_opcode(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Decodes the length class from the opcode's top bits.
pub const fn length_class(opcode: u8) -> LengthClass {
    match opcode & 0x60 {
        0x60 => LengthClass::Explicit,
        0x20 => LengthClass::Fixed(4),
        0x40 => LengthClass::Fixed(6),
        _ => LengthClass::Fixed(2),
    }
}

/// Total length of an outbound message.
///
/// Only opcodes this engine can build are listed; anything else is an
/// [`Error::UnknownOpcode`].
pub fn message_length(opcode: u8) -> Result<usize> {
    match opcode {
        OPC_BUSY | OPC_GPOFF | OPC_GPON | OPC_IDLE => Ok(2),
        OPC_LOCO_SPD | OPC_LOCO_DIRF | OPC_LOCO_SND | OPC_LONG_ACK | OPC_SLOT_STAT1
        | OPC_MOVE_SLOTS | OPC_RQ_SL_DATA | OPC_LOCO_ADR => Ok(4),
        OPC_SL_RD_DATA | OPC_WR_SL_DATA => Ok(14),
        _ => Err(Error::UnknownOpcode { opcode }),
    }
}

/// Short mnemonic for log output.
pub const fn name(opcode: u8) -> &'static str {
    match opcode {
        OPC_BUSY => "BUSY",
        OPC_GPOFF => "GPOFF",
        OPC_GPON => "GPON",
        OPC_IDLE => "IDLE",
        OPC_LOCO_SPD => "LOCO_SPD",
        OPC_LOCO_DIRF => "LOCO_DIRF",
        OPC_LOCO_SND => "LOCO_SND",
        OPC_LONG_ACK => "LONG_ACK",
        OPC_SLOT_STAT1 => "SLOT_STAT1",
        OPC_MOVE_SLOTS => "MOVE_SLOTS",
        OPC_RQ_SL_DATA => "RQ_SL_DATA",
        OPC_LOCO_ADR => "LOCO_ADR",
        OPC_SL_RD_DATA => "SL_RD_DATA",
        OPC_WR_SL_DATA => "WR_SL_DATA",
        _ => "UNKNOWN",
    }
}
