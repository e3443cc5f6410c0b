//! Throttle lifecycle and notification traits.
//!
//! Throttles are owned by an external service. A slot only keeps a
//! [`ThrottleHandle`] and looks the throttle up through
//! [`ThrottleService::throttle`] whenever it needs to notify it, so a
//! released throttle can never be reached through a stale slot.

use crate::slot::SlotView;

/// Opaque, copyable reference to a throttle owned by a [`ThrottleService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleHandle(pub u32);

/// Notification surface of one throttle.
///
/// Each callback receives the slot's read-only view so the throttle can
/// pull whatever state it needs.
pub trait ThrottleListener {
    /// Direction changed.
    fn on_forward_change(&mut self, slot: &dyn SlotView);

    /// Functions `begin..end` were written.
    fn on_function_change(&mut self, slot: &dyn SlotView, begin: usize, end: usize);

    /// Speed changed.
    fn on_speed_change(&mut self, slot: &dyn SlotView);

    /// Emergency stop requested.
    fn on_emergency_stop(&mut self, slot: &dyn SlotView);
}

/// Owner of every throttle object.
///
/// The engine asks for a throttle when a slot enters IN_USE and hands it
/// back when the slot leaves IN_USE; it never frees one itself.
pub trait ThrottleService {
    /// Creates a throttle bound to `slot`.
    ///
    /// Returns `None` if the service cannot provide one; the slot then
    /// stays IN_USE without a throttle.
    fn create_throttle(&mut self, slot: &dyn SlotView) -> Option<ThrottleHandle>;

    /// Releases a throttle previously returned by `create_throttle`.
    fn release_throttle(&mut self, handle: ThrottleHandle);

    /// Looks up a live throttle.
    fn throttle(&mut self, handle: ThrottleHandle) -> Option<&mut dyn ThrottleListener>;
}
