//! Inbound byte-stream framing.
//!
//! [`Framer`] walks one block of freshly read bytes and yields each message
//! in it. Framing is stateless across blocks: a message split between two
//! reads is lost.
//!
//! Recovery rules:
//!
//! - bytes without the top bit set where an opcode is expected are skipped
//!   and reported as one [`Error::NotAnOpcode`]; framing continues
//! - a checksum mismatch, a truncated tail or a bad length byte is reported
//!   once and ends framing of the block
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::framing::Framer;
//! use loconet_bridge::opcode::OPC_LOCO_ADR;
//!
//! // LOCO_ADR 1234 followed by GPON
//! let block = [0xBF, 0x09, 0x52, 0x1B, 0x83, 0x7C];
//! let frames: Vec<_> = Framer::new(&block).collect();
//!
//! assert_eq!(frames.len(), 2);
//! let adr = frames[0].as_ref().unwrap();
//! assert_eq!(adr.opcode(), OPC_LOCO_ADR);
//! assert_eq!(adr.payload(), &[0x09, 0x52]);
//! ```

use crate::error::{Error, Result};
use crate::opcode::{is_opcode, length_class, LengthClass};
use crate::writer::checksum;

/// One validated inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
    header_len: usize,
}

impl<'a> Frame<'a> {
    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Bytes between the header and the checksum.
    ///
    /// An explicit length byte is part of the header, not the payload.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.header_len..self.bytes.len() - 1]
    }

    /// Payload byte `n`, or 0 past the end.
    pub fn arg(&self, n: usize) -> u8 {
        self.payload().get(n).copied().unwrap_or(0)
    }

    /// Complete message, checksum included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Iterator over the messages in one read block.
#[derive(Debug)]
pub struct Framer<'a> {
    block: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Framer<'a> {
    /// Starts framing `block`.
    pub fn new(block: &'a [u8]) -> Self {
        Self {
            block,
            pos: 0,
            done: false,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.block.len() - self.pos
    }

    fn next_frame(&mut self) -> Result<Frame<'a>> {
        let block: &'a [u8] = self.block;
        let rest = &block[self.pos..];
        let opcode = rest[0];

        let (length, header_len) = match length_class(opcode) {
            LengthClass::Fixed(length) => (length, 1),
            LengthClass::Explicit => {
                let length = *rest.get(1).ok_or(Error::Truncated {
                    opcode,
                    needed: 2,
                    available: rest.len(),
                })? as usize;
                if length < 3 {
                    return Err(Error::InvalidLength { opcode, length });
                }
                (length, 2)
            }
        };

        if rest.len() < length {
            return Err(Error::Truncated {
                opcode,
                needed: length,
                available: rest.len(),
            });
        }

        let bytes = &rest[..length];
        let expected = checksum(&bytes[..length - 1]);
        let found = bytes[length - 1];
        if expected != found {
            return Err(Error::ChecksumMismatch {
                opcode,
                expected,
                found,
            });
        }

        self.pos += length;
        Ok(Frame { bytes, header_len })
    }
}

impl<'a> Iterator for Framer<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.block.len() {
            return None;
        }

        let skipped = self.block[self.pos..]
            .iter()
            .take_while(|b| !is_opcode(**b))
            .count();
        if skipped > 0 {
            self.pos += skipped;
            return Some(Err(Error::NotAnOpcode { skipped }));
        }

        let frame = self.next_frame();
        if frame.is_err() {
            // Remainder of the block is not trusted after a bad frame
            self.done = true;
        }
        Some(frame)
    }
}
