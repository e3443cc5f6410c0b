//! Outbound message construction.
//!
//! [`MessageWriter`] lays out one message: opcode, optional length byte,
//! 7-bit payload bytes and the trailing checksum.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::writer::MessageWriter;
//! use loconet_bridge::opcode::OPC_LONG_ACK;
//!
//! let mut writer = MessageWriter::new(OPC_LONG_ACK).unwrap();
//! writer.write_byte(0x3F).unwrap();
//! writer.write_byte(0x00).unwrap();
//! let message = writer.finalize().unwrap();
//!
//! assert_eq!(message.len(), 4);
//! assert_eq!(message.as_bytes(), &[0xB4, 0x3F, 0x00, 0x74]);
//! ```

use heapless::Vec;

use crate::error::{Error, Result};
use crate::opcode::{message_length, MAX_MESSAGE_LEN};

/// Checksum seed.
pub const CHECKSUM_SEED: u8 = 0xFF;

/// XOR of every byte in `bytes`, seeded with `0xFF`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(CHECKSUM_SEED, |acc, b| acc ^ b)
}

/// One complete message ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    bytes: Vec<u8, MAX_MESSAGE_LEN>,
}

impl OutboundMessage {
    /// Opcode of the message.
    pub fn opcode(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    /// Wire bytes, checksum included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a finalized message.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builder for a single outbound message.
///
/// The total length comes from the opcode's entry in the length table.
/// [`finalize`](Self::finalize) only appends the checksum once every payload
/// byte has been written; a short payload is an [`Error::IncompleteMessage`],
/// so a finished message always has exactly its table length.
#[derive(Debug)]
pub struct MessageWriter {
    opcode: u8,
    length: usize,
    bytes: Vec<u8, MAX_MESSAGE_LEN>,
}

impl MessageWriter {
    /// Starts a message for `opcode`.
    ///
    /// Fails with [`Error::UnknownOpcode`] if the opcode has no entry in the
    /// length table.
    pub fn new(opcode: u8) -> Result<Self> {
        let length = message_length(opcode)?;
        let mut writer = Self {
            opcode,
            length,
            bytes: Vec::new(),
        };
        writer.push(opcode)?;
        if length > 6 {
            writer.push(length as u8)?;
        }
        Ok(writer)
    }

    /// Appends `byte & 0x7F`.
    ///
    /// Fails with [`Error::MessageOverflow`] once only the checksum slot is left.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.bytes.len() + 1 >= self.length {
            return Err(self.overflow());
        }
        self.push(byte & 0x7F)
    }

    /// Appends every byte of `bytes`.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        bytes.iter().try_for_each(|b| self.write_byte(*b))
    }

    /// Appends the checksum and returns the finished message.
    ///
    /// Fails with [`Error::IncompleteMessage`] if payload bytes are missing.
    pub fn finalize(mut self) -> Result<OutboundMessage> {
        let expected = self.length - 1;
        if self.bytes.len() != expected {
            return Err(Error::IncompleteMessage {
                opcode: self.opcode,
                written: self.bytes.len(),
                expected,
            });
        }
        let sum = checksum(&self.bytes);
        self.push(sum)?;
        Ok(OutboundMessage { bytes: self.bytes })
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        self.bytes.push(byte).map_err(|_| self.overflow())
    }

    fn overflow(&self) -> Error {
        Error::MessageOverflow {
            opcode: self.opcode,
            capacity: self.length,
        }
    }
}

/// Builds a complete message from `opcode` and its payload.
pub fn build(opcode: u8, payload: &[u8]) -> Result<OutboundMessage> {
    let mut writer = MessageWriter::new(opcode)?;
    writer.write_all(payload)?;
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{OPC_GPON, OPC_LOCO_ADR, OPC_SL_RD_DATA};

    #[test]
    fn checksum_of_gpon() {
        // 0x83 ^ 0xFF
        assert_eq!(checksum(&[OPC_GPON]), 0x7C);
    }

    #[test]
    fn two_byte_message() {
        let message = build(OPC_GPON, &[]).unwrap();
        assert_eq!(message.as_bytes(), &[0x83, 0x7C]);
        assert_eq!(message.opcode(), OPC_GPON);
    }

    #[test]
    fn long_message_carries_length_byte() {
        let payload = [1u8; 11];
        let message = build(OPC_SL_RD_DATA, &payload).unwrap();
        assert_eq!(message.len(), 14);
        assert_eq!(message.as_bytes()[1], 14);
        let (body, sum) = message.as_bytes().split_at(13);
        assert_eq!(checksum(body), sum[0]);
    }

    #[test]
    fn payload_bytes_masked_to_seven_bits() {
        let message = build(OPC_LOCO_ADR, &[0xFF, 0x80]).unwrap();
        assert_eq!(&message.as_bytes()[1..3], &[0x7F, 0x00]);
    }

    #[test]
    fn overflow_is_reported() {
        let mut writer = MessageWriter::new(OPC_LOCO_ADR).unwrap();
        writer.write_byte(1).unwrap();
        writer.write_byte(2).unwrap();
        assert_eq!(
            writer.write_byte(3),
            Err(Error::MessageOverflow {
                opcode: OPC_LOCO_ADR,
                capacity: 4
            })
        );
    }

    #[test]
    fn two_byte_message_takes_no_payload() {
        let mut writer = MessageWriter::new(OPC_GPON).unwrap();
        assert!(writer.write_byte(0).is_err());
    }

    #[test]
    fn incomplete_message_is_rejected() {
        let mut writer = MessageWriter::new(OPC_LOCO_ADR).unwrap();
        writer.write_byte(1).unwrap();
        assert_eq!(
            writer.finalize(),
            Err(Error::IncompleteMessage {
                opcode: OPC_LOCO_ADR,
                written: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(
            MessageWriter::new(0x90).unwrap_err(),
            Error::UnknownOpcode { opcode: 0x90 }
        );
    }
}
