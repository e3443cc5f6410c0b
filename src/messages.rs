//! Broker-facing message bodies for slot events.
//!
//! A [`SlotChanged`] wraps a [`SlotSnapshot`] with the publishing service's
//! id so the broker can route it. With `serde-json-core` enabled it can be
//! written straight into a fixed buffer.
//!
//! # Example
//!
//! ```
//! use loconet_bridge::messages::SlotChanged;
//! use loconet_bridge::traits::SlotSnapshot;
//!
//! let snapshot = SlotSnapshot { index: 3, address: 1234, ..SlotSnapshot::default() };
//! let event = SlotChanged::new("loconet-bridge", snapshot);
//! assert_eq!(event.source.as_str(), "loconet-bridge");
//! assert_eq!(event.slot.address, 1234);
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{short_string, ShortString};
use crate::traits::SlotSnapshot;

/// "Slot N changed" event as published to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotChanged {
    /// Publishing service id.
    pub source: ShortString,
    /// Slot state after the change.
    pub slot: SlotSnapshot,
}

impl SlotChanged {
    /// Creates an event for `slot` published by `source`.
    pub fn new(source: &str, slot: SlotSnapshot) -> Self {
        Self {
            source: short_string(source),
            slot,
        }
    }
}

/// Serializes `event` as JSON into `buf`, returning the byte count.
///
/// Returns `None` if `buf` is too small.
#[cfg(feature = "serde-json-core")]
pub fn encode_slot_changed(event: &SlotChanged, buf: &mut [u8]) -> Option<usize> {
    serde_json_core::to_slice(event, buf).ok()
}

/// Parses a slot-changed event from JSON bytes.
#[cfg(feature = "serde-json-core")]
pub fn parse_slot_changed(json: &[u8]) -> Option<SlotChanged> {
    serde_json_core::from_slice(json).ok().map(|(event, _)| event)
}
