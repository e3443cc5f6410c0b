//! Slot data model and state machine.
//!
//! A [`Slot`] holds the control state of one locomotive. Its state machine
//! is a set of unconditional procedures: any state can move to any other.
//!
//! ```text
//!   FREE ──set_common──▶ COMMON ──set_in_use──▶ IN_USE
//!    ▲                                            │
//!    └───────────────── set_free ◀────────────────┘
//! ```
//!
//! A throttle is requested from the [`ThrottleService`] on entry to IN_USE
//! and handed back on every exit from IN_USE.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::slot::{Slot, SlotState, SlotView};
//! use loconet_bridge::hal::MockThrottleService;
//!
//! let mut service = MockThrottleService::new();
//! let mut slot = Slot::new(5);
//!
//! slot.set_common(Some(1234), &mut service);
//! slot.set_in_use(&mut service);
//! assert_eq!(slot.state(), SlotState::InUse);
//! assert_eq!(service.live_count(), 1);
//!
//! slot.set_free(&mut service);
//! assert_eq!(service.live_count(), 0);
//! ```

use crate::error::{Error, Result};
use crate::traits::{SlotSnapshot, ThrottleHandle, ThrottleListener, ThrottleService};

/// Number of function bits a slot tracks (F0..F31).
pub const FUNCTION_COUNT: usize = 32;

/// Highest valid locomotive address.
pub const MAX_ADDRESS: u16 = 0x3FFF;

/// Speed byte that requests an emergency stop instead of a speed.
pub const EMERGENCY_STOP_SPEED: u8 = 1;

/// Slot state, encoded the way STAT1 carries it.
///
/// | State | Bits |
/// |-------|------|
/// | FREE | `0x00` |
/// | COMMON | `0x10` |
/// | IDLE | `0x20` |
/// | IN_USE | `0x30` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SlotState {
    /// Unbound.
    #[default]
    Free,
    /// Bound to an address, no throttle attached.
    Common,
    /// Representable on the wire, never entered by the engine.
    Idle,
    /// Bound and driven by a throttle.
    InUse,
}

impl SlotState {
    /// STAT1 bits for this state.
    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            SlotState::Free => 0x00,
            SlotState::Common => 0x10,
            SlotState::Idle => 0x20,
            SlotState::InUse => 0x30,
        }
    }

    /// Decodes the state bits of a STAT1 byte; other bits are ignored.
    #[inline]
    pub const fn from_bits(stat: u8) -> Self {
        match stat & 0x30 {
            0x10 => SlotState::Common,
            0x20 => SlotState::Idle,
            0x30 => SlotState::InUse,
            _ => SlotState::Free,
        }
    }

    /// Returns the state as a lowercase string.
    pub const fn as_str(self) -> &'static str {
        match self {
            SlotState::Free => "free",
            SlotState::Common => "common",
            SlotState::Idle => "idle",
            SlotState::InUse => "in_use",
        }
    }
}

/// Read-only view of a slot, handed to throttles and the throttle service.
pub trait SlotView {
    /// Slot index.
    fn id(&self) -> u8;
    /// Current state.
    fn state(&self) -> SlotState;
    /// Bound locomotive address.
    fn address(&self) -> u16;
    /// Current speed (0..=127, never 1).
    fn speed(&self) -> u8;
    /// Direction of travel.
    fn forward(&self) -> bool;
    /// F0..F31, bit n = Fn.
    fn functions(&self) -> u32;

    /// State of function `n`.
    fn function(&self, n: usize) -> bool {
        n < FUNCTION_COUNT && self.functions() & (1 << n) != 0
    }
}

/// One locomotive-control context.
#[derive(Debug, Clone)]
pub struct Slot {
    id: u8,
    state: SlotState,
    address: u16,
    speed: u8,
    forward: bool,
    functions: u32,
    throttle: Option<ThrottleHandle>,
}

impl Slot {
    /// Creates a FREE slot.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: SlotState::Free,
            address: 0,
            speed: 0,
            forward: true,
            functions: 0,
            throttle: None,
        }
    }

    /// Creates slot 0: in use, never handed out, never given a throttle.
    pub fn dispatch() -> Self {
        Self {
            state: SlotState::InUse,
            ..Self::new(0)
        }
    }

    /// Handle of the attached throttle, if any.
    pub fn throttle(&self) -> Option<ThrottleHandle> {
        self.throttle
    }

    /// Moves to COMMON, optionally binding `address`. Drops any throttle.
    pub fn set_common<S: ThrottleService + ?Sized>(
        &mut self,
        address: Option<u16>,
        service: &mut S,
    ) {
        self.release_throttle(service);
        if let Some(address) = address {
            self.address = address & MAX_ADDRESS;
        }
        self.state = SlotState::Common;
    }

    /// Moves to IN_USE, creating a throttle unless one is already attached.
    ///
    /// A repeated null move from the same throttle lands here while the slot
    /// is already IN_USE; the existing throttle is kept.
    pub fn set_in_use<S: ThrottleService + ?Sized>(&mut self, service: &mut S) {
        self.state = SlotState::InUse;
        if self.throttle.is_none() {
            self.throttle = service.create_throttle(&*self);
            if self.throttle.is_none() {
                tracing::warn!(slot = self.id, "throttle service refused a throttle");
            }
        }
    }

    /// Moves to FREE and clears the locomotive state. Drops any throttle.
    pub fn set_free<S: ThrottleService + ?Sized>(&mut self, service: &mut S) {
        self.release_throttle(service);
        *self = Self::new(self.id);
    }

    /// Sets the direction and notifies the throttle.
    pub fn set_forward<S: ThrottleService + ?Sized>(&mut self, forward: bool, service: &mut S) {
        self.forward = forward;
        self.notify(service, |t, s| t.on_forward_change(s));
    }

    /// Writes `values` into functions `offset..offset + values.len()`.
    ///
    /// Rejects writes that would leave F0..F31 without touching any bit.
    pub fn set_functions<S: ThrottleService + ?Sized>(
        &mut self,
        offset: usize,
        values: &[bool],
        service: &mut S,
    ) -> Result<()> {
        let end = offset
            .checked_add(values.len())
            .filter(|end| *end <= FUNCTION_COUNT)
            .ok_or(Error::FunctionRange {
                offset,
                len: values.len(),
            })?;

        for (i, on) in values.iter().enumerate() {
            let bit = 1u32 << (offset + i);
            if *on {
                self.functions |= bit;
            } else {
                self.functions &= !bit;
            }
        }
        self.notify(service, |t, s| t.on_function_change(s, offset, end));
        Ok(())
    }

    /// Sets the speed and notifies the throttle.
    ///
    /// The reserved value 1 is treated as an emergency stop.
    pub fn set_speed<S: ThrottleService + ?Sized>(&mut self, speed: u8, service: &mut S) {
        let speed = speed & 0x7F;
        if speed == EMERGENCY_STOP_SPEED {
            self.emergency_stop(service);
            return;
        }
        self.speed = speed;
        self.notify(service, |t, s| t.on_speed_change(s));
    }

    /// Stops the locomotive and notifies the throttle.
    pub fn emergency_stop<S: ThrottleService + ?Sized>(&mut self, service: &mut S) {
        self.speed = 0;
        self.notify(service, |t, s| t.on_emergency_stop(s));
    }

    /// Copies the slot's state out of the table.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            index: self.id,
            state: self.state,
            address: self.address,
            speed: self.speed,
            forward: self.forward,
            functions: self.functions,
        }
    }

    fn release_throttle<S: ThrottleService + ?Sized>(&mut self, service: &mut S) {
        if let Some(handle) = self.throttle.take() {
            service.release_throttle(handle);
        }
    }

    fn notify<S, F>(&self, service: &mut S, f: F)
    where
        S: ThrottleService + ?Sized,
        F: FnOnce(&mut dyn ThrottleListener, &dyn SlotView),
    {
        if let Some(handle) = self.throttle {
            if let Some(throttle) = service.throttle(handle) {
                f(throttle, self);
            }
        }
    }
}

impl SlotView for Slot {
    fn id(&self) -> u8 {
        self.id
    }

    fn state(&self) -> SlotState {
        self.state
    }

    fn address(&self) -> u16 {
        self.address
    }

    fn speed(&self) -> u8 {
        self.speed
    }

    fn forward(&self) -> bool {
        self.forward
    }

    fn functions(&self) -> u32 {
        self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockThrottleService, ThrottleEvent};

    fn in_use_slot(service: &mut MockThrottleService) -> Slot {
        let mut slot = Slot::new(3);
        slot.set_common(Some(42), service);
        slot.set_in_use(service);
        slot
    }

    #[test]
    fn new_slot_is_free() {
        let slot = Slot::new(7);
        assert_eq!(slot.id(), 7);
        assert_eq!(slot.state(), SlotState::Free);
        assert!(slot.throttle().is_none());
    }

    #[test]
    fn dispatch_slot_is_in_use_without_throttle() {
        let slot = Slot::dispatch();
        assert_eq!(slot.id(), 0);
        assert_eq!(slot.state(), SlotState::InUse);
        assert!(slot.throttle().is_none());
    }

    #[test]
    fn state_bits_round_trip() {
        for state in [
            SlotState::Free,
            SlotState::Common,
            SlotState::Idle,
            SlotState::InUse,
        ] {
            assert_eq!(SlotState::from_bits(state.bits()), state);
        }
        // COMMON and IN_USE differ by bit 5 only
        assert_eq!(SlotState::Common.bits() ^ SlotState::InUse.bits(), 0x20);
    }

    #[test]
    fn common_binds_address() {
        let mut service = MockThrottleService::new();
        let mut slot = Slot::new(1);
        slot.set_common(Some(0x4000 | 99), &mut service);
        assert_eq!(slot.state(), SlotState::Common);
        assert_eq!(slot.address(), 99);

        slot.set_common(None, &mut service);
        assert_eq!(slot.address(), 99);
    }

    #[test]
    fn in_use_creates_one_throttle() {
        let mut service = MockThrottleService::new();
        let mut slot = in_use_slot(&mut service);
        let handle = slot.throttle();
        assert!(handle.is_some());

        // Repeated null move keeps the same throttle
        slot.set_in_use(&mut service);
        assert_eq!(slot.throttle(), handle);
        assert_eq!(service.created, 1);
    }

    #[test]
    fn leaving_in_use_releases_throttle() {
        let mut service = MockThrottleService::new();
        let mut slot = in_use_slot(&mut service);
        slot.set_common(None, &mut service);
        assert!(slot.throttle().is_none());
        assert_eq!(service.released, 1);
        assert_eq!(service.live_count(), 0);
    }

    #[test]
    fn refused_throttle_leaves_slot_in_use() {
        let mut service = MockThrottleService::new().refusing();
        let slot = in_use_slot(&mut service);
        assert_eq!(slot.state(), SlotState::InUse);
        assert!(slot.throttle().is_none());
    }

    #[test]
    fn free_resets_locomotive_state() {
        let mut service = MockThrottleService::new();
        let mut slot = in_use_slot(&mut service);
        slot.set_speed(40, &mut service);
        slot.set_forward(false, &mut service);
        slot.set_free(&mut service);

        assert_eq!(slot.state(), SlotState::Free);
        assert_eq!(slot.speed(), 0);
        assert!(slot.forward());
        assert_eq!(slot.id(), 3);
        assert_eq!(service.live_count(), 0);
    }

    #[test]
    fn mutators_notify_attached_throttle() {
        let mut service = MockThrottleService::new();
        let mut slot = in_use_slot(&mut service);
        let handle = slot.throttle().unwrap();

        slot.set_forward(false, &mut service);
        slot.set_speed(50, &mut service);
        slot.set_functions(1, &[true, false], &mut service).unwrap();
        slot.emergency_stop(&mut service);

        assert_eq!(
            service.events(handle),
            &[
                ThrottleEvent::Forward(false),
                ThrottleEvent::Speed(50),
                ThrottleEvent::Functions { begin: 1, end: 3 },
                ThrottleEvent::EmergencyStop,
            ]
        );
    }

    #[test]
    fn mutators_without_throttle_only_update_fields() {
        let mut service = MockThrottleService::new();
        let mut slot = Slot::new(2);
        slot.set_speed(12, &mut service);
        assert_eq!(slot.speed(), 12);
        assert_eq!(service.created, 0);
    }

    #[test]
    fn speed_one_is_emergency_stop() {
        let mut service = MockThrottleService::new();
        let mut slot = in_use_slot(&mut service);
        slot.set_speed(60, &mut service);
        slot.set_speed(EMERGENCY_STOP_SPEED, &mut service);
        assert_eq!(slot.speed(), 0);
        let handle = slot.throttle().unwrap();
        assert_eq!(
            service.events(handle).last(),
            Some(&ThrottleEvent::EmergencyStop)
        );
    }

    #[test]
    fn functions_set_and_clear() {
        let mut service = MockThrottleService::new();
        let mut slot = Slot::new(1);
        slot.set_functions(0, &[true, true, false, true], &mut service)
            .unwrap();
        assert_eq!(slot.functions(), 0b1011);
        slot.set_functions(1, &[false], &mut service).unwrap();
        assert_eq!(slot.functions(), 0b1001);
        assert!(slot.function(3));
        assert!(!slot.function(40));
    }

    #[test]
    fn functions_reject_out_of_range() {
        let mut service = MockThrottleService::new();
        let mut slot = Slot::new(1);
        assert!(slot.set_functions(31, &[true], &mut service).is_ok());
        assert_eq!(
            slot.set_functions(30, &[true, true, true], &mut service),
            Err(Error::FunctionRange { offset: 30, len: 3 })
        );
        assert_eq!(
            slot.set_functions(usize::MAX, &[true], &mut service),
            Err(Error::FunctionRange {
                offset: usize::MAX,
                len: 1
            })
        );
        assert_eq!(slot.functions(), 1u32 << 31);
    }
}
