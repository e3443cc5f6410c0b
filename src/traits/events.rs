//! Outward slot-change notifications.

use crate::slot::SlotState;

/// Copy of one slot's state, detached from the slot table.
///
/// Carries everything a consumer needs to display or forward the slot.
/// Implements `serde::Serialize` when the `serde` feature is enabled.
///
/// # Example
///
/// ```rust
/// use loconet_bridge::traits::SlotSnapshot;
/// use loconet_bridge::slot::SlotState;
///
/// let snapshot = SlotSnapshot::default();
/// assert_eq!(snapshot.state, SlotState::Free);
/// assert!(snapshot.forward);
/// assert!(!snapshot.function(0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotSnapshot {
    /// Slot index (0..=127).
    pub index: u8,
    /// Slot state.
    pub state: SlotState,
    /// Bound locomotive address.
    pub address: u16,
    /// Speed (0..=127).
    pub speed: u8,
    /// Direction of travel.
    pub forward: bool,
    /// F0..F31, bit n = Fn.
    pub functions: u32,
}

impl SlotSnapshot {
    /// Returns the state of function `n` (false past F31).
    pub fn function(&self, n: usize) -> bool {
        n < 32 && self.functions & (1 << n) != 0
    }
}

impl Default for SlotSnapshot {
    fn default() -> Self {
        Self {
            index: 0,
            state: SlotState::Free,
            address: 0,
            speed: 0,
            forward: true,
            functions: 0,
        }
    }
}

/// Receiver of "slot N changed" events.
pub trait SlotEventSink {
    /// Called after the slot described by `snapshot` changed.
    fn slot_changed(&mut self, snapshot: &SlotSnapshot);
}

/// Sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SlotEventSink for NullSink {
    fn slot_changed(&mut self, _snapshot: &SlotSnapshot) {}
}
