//! Bit-packing helpers for the slot status, direction/function and sound bytes.
//!
//! All wire payload bytes are 7 bits wide. Layouts:
//!
//! ```text
//! STAT1:  x x S5 S4 x D2 D1 D0   S5/S4 = slot state, D = decoder type
//! DIRF:   x x DIR F0 F4 F3 F2 F1 DIR set = reverse
//! SND:    x x x x F8 F7 F6 F5
//! ```

use crate::slot::SlotState;

/// Mask for the slot-state bits of STAT1.
pub const STAT_STATE_MASK: u8 = 0x30;

/// Decoder-type bits for 128 speed steps.
pub const STAT_128_STEP: u8 = 0x03;

/// Reverse direction bit of DIRF.
pub const DIRF_REVERSE: u8 = 0x20;

/// F0 bit of DIRF.
pub const DIRF_F0: u8 = 0x10;

/// Fixed track-status byte: power on, not paused, Loconet 1.1.
pub const TRACK_STATUS: u8 = 0x07;

/// Builds the STAT1 byte for a slot in `state`.
#[inline]
pub const fn encode_stat1(state: SlotState) -> u8 {
    state.bits() | STAT_128_STEP
}

/// Reads the slot state out of a STAT1 byte.
#[inline]
pub const fn decode_stat1(stat: u8) -> SlotState {
    SlotState::from_bits(stat)
}

/// Builds the DIRF byte from direction and F0-F4.
pub fn encode_dirf(forward: bool, functions: u32) -> u8 {
    let mut dirf = 0;
    if !forward {
        dirf |= DIRF_REVERSE;
    }
    if functions & 1 != 0 {
        dirf |= DIRF_F0;
    }
    // F1..F4 land on bits 0..3
    dirf | ((functions >> 1) & 0x0F) as u8
}

/// Splits a DIRF byte into the forward flag and `[F0, F1, F2, F3, F4]`.
pub fn decode_dirf(dirf: u8) -> (bool, [bool; 5]) {
    let forward = dirf & DIRF_REVERSE == 0;
    let functions = [
        dirf & DIRF_F0 != 0,
        dirf & 0x01 != 0,
        dirf & 0x02 != 0,
        dirf & 0x04 != 0,
        dirf & 0x08 != 0,
    ];
    (forward, functions)
}

/// Splits a SND byte into `[F5, F6, F7, F8]`.
pub fn decode_snd(snd: u8) -> [bool; 4] {
    [
        snd & 0x01 != 0,
        snd & 0x02 != 0,
        snd & 0x04 != 0,
        snd & 0x08 != 0,
    ]
}

/// Joins the two 7-bit halves of a locomotive address.
#[inline]
pub const fn join_address(high: u8, low: u8) -> u16 {
    (((high & 0x7F) as u16) << 7) | (low & 0x7F) as u16
}

/// Splits a 14-bit address into `(high, low)` 7-bit halves.
#[inline]
pub const fn split_address(address: u16) -> (u8, u8) {
    (((address >> 7) & 0x7F) as u8, (address & 0x7F) as u8)
}
