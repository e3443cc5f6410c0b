//! Error types for the Loconet engine.

use thiserror::Error;

/// Errors raised by the slot table, the message builder and the framer.
///
/// None of these are fatal to the host: the engine logs them and, where the
/// failing request came over the wire, answers with a NAK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Slot index outside the 128-entry table.
    #[error("slot {index} is out of range")]
    SlotOutOfRange {
        /// Requested index.
        index: usize,
    },

    /// Slot 0 is the dispatch slot and never carries a locomotive.
    #[error("slot 0 is reserved for dispatch")]
    ReservedSlot,

    /// Every addressable slot is already bound.
    #[error("no free slot for address {address}")]
    NoFreeSlot {
        /// Address that could not be placed.
        address: u16,
    },

    /// Address is already bound to another slot.
    #[error("address {address} is already bound to slot {slot}")]
    AddressInUse {
        /// Contested address.
        address: u16,
        /// Slot currently holding it.
        slot: u8,
    },

    /// The requested slot state cannot be forced.
    #[error("unsupported slot state {state:?}")]
    UnsupportedState {
        /// Requested state.
        state: crate::slot::SlotState,
    },

    /// Function write would leave the F0..F31 range.
    #[error("function write at offset {offset} with {len} values exceeds F0..F31")]
    FunctionRange {
        /// First function index written.
        offset: usize,
        /// Number of values.
        len: usize,
    },

    /// Move-slots pattern the engine does not implement.
    #[error("unsupported slot move {src} -> {dest}")]
    UnsupportedMove {
        /// Source slot.
        src: u8,
        /// Destination slot.
        dest: u8,
    },

    /// Payload byte written past the space reserved for the checksum.
    #[error("message {opcode:#04x} overflow: capacity {capacity} bytes")]
    MessageOverflow {
        /// Opcode of the message being built.
        opcode: u8,
        /// Total message length.
        capacity: usize,
    },

    /// Message finalized before every payload byte was written.
    #[error("message {opcode:#04x} incomplete: {written} of {expected} bytes")]
    IncompleteMessage {
        /// Opcode of the message being built.
        opcode: u8,
        /// Bytes written so far, header included.
        written: usize,
        /// Bytes required before the checksum.
        expected: usize,
    },

    /// Opcode missing from the outbound length table.
    #[error("unknown opcode {opcode:#04x}")]
    UnknownOpcode {
        /// Offending opcode.
        opcode: u8,
    },

    /// Received checksum does not match the computed one.
    #[error("checksum mismatch on {opcode:#04x}: expected {expected:#04x}, got {found:#04x}")]
    ChecksumMismatch {
        /// Opcode of the rejected message.
        opcode: u8,
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the message.
        found: u8,
    },

    /// Bytes without the top bit set where an opcode was expected.
    #[error("skipped {skipped} non-opcode bytes")]
    NotAnOpcode {
        /// Number of bytes skipped.
        skipped: usize,
    },

    /// Explicit length byte too small to hold a message.
    #[error("invalid length {length} for opcode {opcode:#04x}")]
    InvalidLength {
        /// Opcode carrying the length byte.
        opcode: u8,
        /// Declared length.
        length: usize,
    },

    /// Message runs past the end of the read block.
    #[error("truncated message {opcode:#04x}: need {needed} bytes, have {available}")]
    Truncated {
        /// Opcode of the partial message.
        opcode: u8,
        /// Declared message length.
        needed: usize,
        /// Bytes left in the block.
        available: usize,
    },
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;
