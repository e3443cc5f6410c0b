//! Byte transport and time source abstractions.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::traits::{Clock, Transport};
//! use loconet_bridge::hal::{MockClock, MockTransport};
//!
//! let mut transport = MockTransport::new();
//! transport.write(&[0x83, 0x7C]).unwrap();
//! assert!(!transport.is_send_idle());
//!
//! transport.complete_send();
//! assert!(transport.is_send_idle());
//! assert_eq!(transport.sent[0], vec![0x83, 0x7C]);
//!
//! let mut clock = MockClock::new();
//! clock.advance(20);
//! assert_eq!(clock.now_ms(), 20);
//! ```

/// Serial transport to the Loconet bus.
///
/// Both directions are non-blocking. A write hands the whole message to the
/// driver's single send buffer; completion is observed by polling
/// [`is_send_idle`](Self::is_send_idle).
///
/// # Implementation Notes
///
/// - `read` returns `Ok(0)` when nothing has arrived
/// - `write` must fail if a previous write is still outstanding
pub trait Transport {
    /// Error type for transport operations.
    type Error: core::fmt::Debug;

    /// Copies whatever bytes are available into `buf`, returning the count.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Submits one complete message for transmission.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Returns true once the previous write has fully left the send buffer.
    fn is_send_idle(&self) -> bool;

    /// Returns true if received bytes are waiting.
    ///
    /// Default implementation always returns true; `read` then reports zero
    /// bytes when nothing is pending.
    fn is_receive_ready(&self) -> bool {
        true
    }
}

/// Monotonic logical-tick source.
///
/// The engine only ever compares and adds ticks; it never reads wall time.
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
