//! Mock implementations for testing without a bus.
//!
//! This module provides test doubles for every collaborator trait,
//! enabling the engine to run on desktop without serial hardware.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTransport`] | [`Transport`] | Scripted input, captured output, controllable idle |
//! | [`MockThrottleService`] | [`ThrottleService`] | Tracks throttle lifetimes and notifications |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`RecordingSink`] | [`SlotEventSink`] | Captures slot-changed events |
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::{Config, ProtocolEngine};
//! use loconet_bridge::hal::{MockThrottleService, MockTransport, RecordingSink};
//!
//! let mut transport = MockTransport::new().with_auto_complete();
//! // LOCO_ADR 1234
//! transport.push_incoming(&[0xBF, 0x09, 0x52, 0x1B]);
//!
//! let mut engine = ProtocolEngine::new(
//!     transport,
//!     MockThrottleService::new(),
//!     RecordingSink::new(),
//!     &Config::default().engine,
//! );
//! engine.update(0).unwrap();
//!
//! assert_eq!(engine.sink().events.len(), 1);
//! assert_eq!(engine.transport().sent.len(), 1);
//! ```
//!
//! [`Transport`]: crate::traits::Transport
//! [`ThrottleService`]: crate::traits::ThrottleService
//! [`Clock`]: crate::traits::Clock
//! [`SlotEventSink`]: crate::traits::SlotEventSink

use std::collections::{HashMap, VecDeque};

use crate::slot::SlotView;
use crate::traits::{
    Clock, SlotEventSink, SlotSnapshot, ThrottleHandle, ThrottleListener, ThrottleService,
    Transport,
};

// ============================================================================
// Transport Mock
// ============================================================================

/// Errors produced by [`MockTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTransportError {
    /// Write attempted while the previous message was still in flight.
    Busy,
    /// Scripted write failure.
    WriteFailed,
    /// Scripted read failure.
    ReadFailed,
}

/// Mock serial transport.
///
/// Incoming bytes are queued with [`push_incoming`](Self::push_incoming).
/// Every accepted write is recorded in `sent` and stays in flight until
/// [`complete_send`](Self::complete_send), unless auto-complete is on.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Every accepted write, in order.
    pub sent: Vec<Vec<u8>>,
    /// Writes attempted while a message was in flight.
    pub rejected_writes: usize,
    incoming: VecDeque<u8>,
    in_flight: bool,
    busy: bool,
    auto_complete: bool,
    fail_next_write: bool,
    fail_next_read: bool,
}

impl MockTransport {
    /// Creates an idle transport with nothing to read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes every write immediately.
    pub fn with_auto_complete(mut self) -> Self {
        self.auto_complete = true;
        self
    }

    /// Queues bytes to be returned by `read`.
    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Holds the send buffer busy regardless of writes.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Marks the in-flight write as transmitted.
    pub fn complete_send(&mut self) {
        self.in_flight = false;
    }

    /// Returns true while a write is outstanding.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Makes the next write fail.
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }

    /// Makes the next read fail.
    pub fn fail_next_read(&mut self) {
        self.fail_next_read = true;
    }

    /// Bytes not yet read.
    pub fn unread(&self) -> usize {
        self.incoming.len()
    }
}

impl Transport for MockTransport {
    type Error = MockTransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if core::mem::take(&mut self.fail_next_read) {
            return Err(MockTransportError::ReadFailed);
        }
        let n = buf.len().min(self.incoming.len());
        for (dst, src) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if !self.is_send_idle() {
            self.rejected_writes += 1;
            return Err(MockTransportError::Busy);
        }
        if core::mem::take(&mut self.fail_next_write) {
            return Err(MockTransportError::WriteFailed);
        }
        self.sent.push(bytes.to_vec());
        self.in_flight = !self.auto_complete;
        Ok(())
    }

    fn is_send_idle(&self) -> bool {
        !self.busy && !self.in_flight
    }

    fn is_receive_ready(&self) -> bool {
        !self.incoming.is_empty() || self.fail_next_read
    }
}

// ============================================================================
// Throttle Mocks
// ============================================================================

/// Notification recorded by a [`MockThrottle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleEvent {
    /// Direction changed to the carried value.
    Forward(bool),
    /// Functions `begin..end` written.
    Functions {
        /// First function index.
        begin: usize,
        /// One past the last function index.
        end: usize,
    },
    /// Speed changed to the carried value.
    Speed(u8),
    /// Emergency stop.
    EmergencyStop,
}

/// Throttle that records every notification.
#[derive(Debug, Default)]
pub struct MockThrottle {
    /// Slot the throttle was created for.
    pub slot: u8,
    /// Address of that slot at creation.
    pub address: u16,
    /// Notifications in arrival order.
    pub events: Vec<ThrottleEvent>,
}

impl ThrottleListener for MockThrottle {
    fn on_forward_change(&mut self, slot: &dyn SlotView) {
        self.events.push(ThrottleEvent::Forward(slot.forward()));
    }

    fn on_function_change(&mut self, _slot: &dyn SlotView, begin: usize, end: usize) {
        self.events.push(ThrottleEvent::Functions { begin, end });
    }

    fn on_speed_change(&mut self, slot: &dyn SlotView) {
        self.events.push(ThrottleEvent::Speed(slot.speed()));
    }

    fn on_emergency_stop(&mut self, _slot: &dyn SlotView) {
        self.events.push(ThrottleEvent::EmergencyStop);
    }
}

/// Throttle service that owns [`MockThrottle`]s.
///
/// # Example
///
/// ```rust
/// use loconet_bridge::hal::MockThrottleService;
/// use loconet_bridge::slot::Slot;
/// use loconet_bridge::traits::ThrottleService;
///
/// let mut service = MockThrottleService::new();
/// let handle = service.create_throttle(&Slot::new(4)).unwrap();
/// assert_eq!(service.live_count(), 1);
/// assert_eq!(service.get(handle).unwrap().slot, 4);
///
/// service.release_throttle(handle);
/// assert_eq!(service.live_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockThrottleService {
    /// Number of throttles created.
    pub created: usize,
    /// Number of throttles released.
    pub released: usize,
    throttles: HashMap<ThrottleHandle, MockThrottle>,
    next_id: u32,
    refuse: bool,
}

impl MockThrottleService {
    /// Creates a service that grants every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every throttle request.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Number of throttles currently alive.
    pub fn live_count(&self) -> usize {
        self.throttles.len()
    }

    /// Live throttle behind `handle`.
    pub fn get(&self, handle: ThrottleHandle) -> Option<&MockThrottle> {
        self.throttles.get(&handle)
    }

    /// Notifications received by a live throttle (empty once released).
    pub fn events(&self, handle: ThrottleHandle) -> &[ThrottleEvent] {
        self.throttles
            .get(&handle)
            .map(|t| t.events.as_slice())
            .unwrap_or(&[])
    }
}

impl ThrottleService for MockThrottleService {
    fn create_throttle(&mut self, slot: &dyn SlotView) -> Option<ThrottleHandle> {
        if self.refuse {
            return None;
        }
        let handle = ThrottleHandle(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.throttles.insert(
            handle,
            MockThrottle {
                slot: slot.id(),
                address: slot.address(),
                events: Vec::new(),
            },
        );
        Some(handle)
    }

    fn release_throttle(&mut self, handle: ThrottleHandle) {
        if self.throttles.remove(&handle).is_some() {
            self.released += 1;
        }
    }

    fn throttle(&mut self, handle: ThrottleHandle) -> Option<&mut dyn ThrottleListener> {
        self.throttles
            .get_mut(&handle)
            .map(|t| t as &mut dyn ThrottleListener)
    }
}

// ============================================================================
// Clock and Sink Mocks
// ============================================================================

/// Mock clock for testing.
///
/// # Example
///
/// ```rust
/// use loconet_bridge::hal::MockClock;
/// use loconet_bridge::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

/// Sink that keeps every slot-changed event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Events in arrival order.
    pub events: Vec<SlotSnapshot>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot indices of the recorded events.
    pub fn indices(&self) -> Vec<u8> {
        self.events.iter().map(|e| e.index).collect()
    }

    /// Most recent event.
    pub fn last(&self) -> Option<&SlotSnapshot> {
        self.events.last()
    }
}

impl SlotEventSink for RecordingSink {
    fn slot_changed(&mut self, snapshot: &SlotSnapshot) {
        self.events.push(*snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_reads_in_chunks() {
        let mut transport = MockTransport::new();
        transport.push_incoming(&[1, 2, 3]);
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf), Ok(2));
        assert_eq!(buf, [1, 2]);
        assert_eq!(transport.unread(), 1);
    }

    #[test]
    fn transport_rejects_overlapping_writes() {
        let mut transport = MockTransport::new();
        transport.write(&[0x83, 0x7C]).unwrap();
        assert_eq!(transport.write(&[0x82, 0x7D]), Err(MockTransportError::Busy));
        assert_eq!(transport.rejected_writes, 1);
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn transport_auto_complete_stays_idle() {
        let mut transport = MockTransport::new().with_auto_complete();
        transport.write(&[0x83, 0x7C]).unwrap();
        assert!(transport.is_send_idle());
    }

    #[test]
    fn transport_scripted_read_failure() {
        let mut transport = MockTransport::new();
        transport.fail_next_read();
        assert!(transport.is_receive_ready());
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf), Err(MockTransportError::ReadFailed));
        assert_eq!(transport.read(&mut buf), Ok(0));
    }

    #[test]
    fn release_of_unknown_handle_is_ignored() {
        let mut service = MockThrottleService::new();
        service.release_throttle(ThrottleHandle(9));
        assert_eq!(service.released, 0);
    }
}
