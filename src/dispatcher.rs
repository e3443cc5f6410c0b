//! Outbound message queue with a single message in flight.
//!
//! The transport has one send buffer. [`MessageDispatcher`] only hands it a
//! message once [`Transport::is_send_idle`] reports the previous one gone,
//! and holds everything else in FIFO order.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::dispatcher::MessageDispatcher;
//! use loconet_bridge::hal::MockTransport;
//! use loconet_bridge::opcode::{OPC_GPOFF, OPC_GPON};
//! use loconet_bridge::writer::build;
//!
//! let mut transport = MockTransport::new();
//! let mut dispatcher = MessageDispatcher::new();
//!
//! dispatcher.send(&mut transport, build(OPC_GPON, &[]).unwrap());
//! dispatcher.send(&mut transport, build(OPC_GPOFF, &[]).unwrap());
//! assert_eq!(transport.sent.len(), 1);
//! assert_eq!(dispatcher.pending(), 1);
//!
//! transport.complete_send();
//! dispatcher.update(&mut transport);
//! assert_eq!(transport.sent.len(), 2);
//! assert_eq!(dispatcher.pending(), 0);
//! ```

use std::collections::VecDeque;

use crate::traits::Transport;
use crate::writer::OutboundMessage;

/// FIFO of messages waiting for the transport.
#[derive(Debug, Default)]
pub struct MessageDispatcher {
    queue: VecDeque<OutboundMessage>,
}

impl MessageDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `message` now if nothing is waiting and the transport is idle,
    /// otherwise queues it behind earlier messages.
    pub fn send<T: Transport>(&mut self, transport: &mut T, message: OutboundMessage) {
        if self.queue.is_empty() && transport.is_send_idle() {
            self.submit(transport, message);
            return;
        }
        tracing::trace!(
            opcode = message.opcode(),
            queued = self.queue.len() + 1,
            "transport busy, queueing message"
        );
        self.queue.push_back(message);
        self.pump(transport);
    }

    /// Submits the head of the queue if the transport has gone idle.
    ///
    /// Call once per engine tick.
    pub fn update<T: Transport>(&mut self, transport: &mut T) {
        self.pump(transport);
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    fn pump<T: Transport>(&mut self, transport: &mut T) {
        if !transport.is_send_idle() {
            return;
        }
        if let Some(message) = self.queue.pop_front() {
            self.submit(transport, message);
        }
    }

    fn submit<T: Transport>(&mut self, transport: &mut T, message: OutboundMessage) {
        match transport.write(message.as_bytes()) {
            Ok(()) => {
                tracing::debug!(opcode = message.opcode(), len = message.len(), "message sent");
            }
            Err(err) => {
                // Head of the queue keeps FIFO order on retry
                tracing::warn!(opcode = message.opcode(), error = ?err, "transport write failed");
                self.queue.push_front(message);
            }
        }
    }
}
