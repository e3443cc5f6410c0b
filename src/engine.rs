//! Protocol engine: the tick-driven loop that ties the bus to the slot table.
//!
//! This module provides [`ProtocolEngine`], which owns the transport, the
//! [`SlotManager`] and the [`MessageDispatcher`].
//!
//! # Overview
//!
//! Each call to [`ProtocolEngine::update`]:
//! - runs a purge pass if one is due
//! - hands the next queued message to the transport if it is idle
//! - reads the bytes that arrived since the last call, frames them and
//!   dispatches each message to its opcode handler
//!
//! Nothing blocks; all waiting is expressed as polling across ticks.
//!
//! # Example
//!
//! ```rust
//! use loconet_bridge::{Config, ProtocolEngine};
//! use loconet_bridge::hal::{MockThrottleService, MockTransport, RecordingSink};
//! use loconet_bridge::opcode::{OPC_LOCO_ADR, OPC_MOVE_SLOTS};
//! use loconet_bridge::slot::SlotState;
//! use loconet_bridge::writer::build;
//!
//! let mut engine = ProtocolEngine::new(
//!     MockTransport::new().with_auto_complete(),
//!     MockThrottleService::new(),
//!     RecordingSink::new(),
//!     &Config::default().engine,
//! );
//!
//! // Throttle asks for address 1234, then claims the slot with a null move
//! let adr = build(OPC_LOCO_ADR, &[0x09, 0x52]).unwrap();
//! let null_move = build(OPC_MOVE_SLOTS, &[1, 1]).unwrap();
//! engine.transport_mut().push_incoming(adr.as_bytes());
//! engine.transport_mut().push_incoming(null_move.as_bytes());
//!
//! engine.update(0).unwrap();
//! assert_eq!(engine.slot(1).unwrap().state, SlotState::InUse);
//! assert_eq!(engine.slot(1).unwrap().address, 1234);
//! ```

use crate::config::EngineConfig;
use crate::dispatcher::MessageDispatcher;
use crate::error::{Error, Result};
use crate::framing::{Frame, Framer};
use crate::opcode::{
    self, is_opcode, NAK_CODE, OPC_LOCO_ADR, OPC_LOCO_DIRF, OPC_LOCO_SND, OPC_LOCO_SPD, OPC_LONG_ACK,
    OPC_MOVE_SLOTS, OPC_RQ_SL_DATA, OPC_SLOT_STAT1, OPC_SL_RD_DATA, OPC_VENDOR_A3,
    OPC_VENDOR_D4, OPC_VENDOR_E6,
};
use crate::packing::{decode_dirf, decode_snd, decode_stat1, join_address};
use crate::slot::EMERGENCY_STOP_SPEED;
use crate::slot_manager::{SlotManager, DISPATCH_SLOT, SLOT_COUNT};
use crate::traits::{Clock, SlotEventSink, SlotSnapshot, ThrottleService, Transport};
use crate::writer::{build, OutboundMessage};

/// Bytes requested from the transport per read call.
const READ_CHUNK: usize = 64;

/// Counters kept by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineStats {
    /// Messages that passed framing and checksum.
    pub messages_received: u64,
    /// Messages rejected by checksum.
    pub checksum_errors: u64,
    /// Noise runs, abandoned partial messages and bad length bytes.
    pub framing_errors: u64,
    /// Opcodes with no handler.
    pub unhandled_opcodes: u64,
    /// NAKs sent back to throttles.
    pub naks_sent: u64,
    /// Messages handed to the dispatcher.
    pub messages_submitted: u64,
    /// Slots dropped back to COMMON by purge.
    pub slots_purged: u64,
}

/// Loconet protocol engine.
///
/// # Type Parameters
///
/// - `T`: bus transport ([`Transport`])
/// - `S`: throttle owner ([`ThrottleService`])
/// - `N`: receiver of slot-changed events ([`SlotEventSink`])
///
/// # Thread Safety
///
/// Single-threaded by construction: all state is touched only from
/// [`update`](Self::update). Hosts driving it from several tasks must wrap
/// it in a mutex.
pub struct ProtocolEngine<T: Transport, S: ThrottleService, N: SlotEventSink> {
    transport: T,
    slots: SlotManager<S>,
    dispatcher: MessageDispatcher,
    sink: N,
    purge_interval_ms: u64,
    next_purge_ms: u64,
    max_read: usize,
    rx: Vec<u8>,
    partial: usize,
    stats: EngineStats,
}

impl<T: Transport, S: ThrottleService, N: SlotEventSink> ProtocolEngine<T, S, N> {
    /// Creates an engine with every slot FREE except the dispatch slot.
    pub fn new(transport: T, service: S, sink: N, config: &EngineConfig) -> Self {
        Self {
            transport,
            slots: SlotManager::new(service, config.purge_timeout_ms),
            dispatcher: MessageDispatcher::new(),
            sink,
            purge_interval_ms: config.purge_interval_ms,
            next_purge_ms: 0,
            max_read: config.max_read_per_update.max(1),
            rx: Vec::with_capacity(config.max_read_per_update),
            partial: 0,
            stats: EngineStats::default(),
        }
    }

    /// Runs one engine tick at logical time `now`.
    ///
    /// Only transport read errors are returned; every protocol error is
    /// handled inside the tick.
    pub fn update(&mut self, now: u64) -> core::result::Result<(), T::Error> {
        if now >= self.next_purge_ms {
            self.purge(now);
            self.next_purge_ms = now.saturating_add(self.purge_interval_ms);
        }

        self.dispatcher.update(&mut self.transport);

        self.fill_rx()?;
        if self.rx.len() > self.partial {
            let block = core::mem::take(&mut self.rx);
            self.partial = self.process_block(&block, now);
            self.rx = block;
            // Keep an incomplete trailing message for the next read
            let consumed = self.rx.len() - self.partial;
            self.rx.drain(..consumed);
        }
        Ok(())
    }

    /// Runs one engine tick at the clock's current time.
    pub fn tick<C: Clock>(&mut self, clock: &C) -> core::result::Result<(), T::Error> {
        self.update(clock.now_ms())
    }

    /// Queues `message` for the bus.
    pub fn send(&mut self, message: OutboundMessage) {
        self.stats.messages_submitted += 1;
        self.dispatcher.send(&mut self.transport, message);
    }

    /// Snapshot of slot `index`.
    pub fn slot(&self, index: u8) -> Option<SlotSnapshot> {
        self.slots.snapshot(index).ok()
    }

    /// The slot table.
    pub fn slots(&self) -> &SlotManager<S> {
        &self.slots
    }

    /// Mutable slot table, for hosts acting on slots outside the bus.
    pub fn slots_mut(&mut self) -> &mut SlotManager<S> {
        &mut self.slots
    }

    /// Engine counters.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Messages waiting for the transport.
    pub fn pending_messages(&self) -> usize {
        self.dispatcher.pending()
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The event sink.
    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Mutable event sink.
    pub fn sink_mut(&mut self) -> &mut N {
        &mut self.sink
    }

    fn purge(&mut self, now: u64) {
        let mut purged: heapless::Vec<u8, SLOT_COUNT> = heapless::Vec::new();
        self.slots.purge_slots(now, |index| {
            let _ = purged.push(index);
        });
        for index in purged {
            self.stats.slots_purged += 1;
            self.notify_slot(index);
        }
    }

    /// Reads up to `max_read` new bytes behind any carried partial message.
    fn fill_rx(&mut self) -> core::result::Result<(), T::Error> {
        let mut read = 0;
        let mut chunk = [0u8; READ_CHUNK];
        while read < self.max_read && self.transport.is_receive_ready() {
            let want = (self.max_read - read).min(READ_CHUNK);
            let n = self.transport.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            self.rx.extend_from_slice(&chunk[..n]);
            read += n;
        }

        // Payload bytes are 7-bit, so an opcode here means the carried
        // message was cut short on the wire
        let carried = self.partial;
        if carried > 0 && self.rx.get(carried).is_some_and(|b| is_opcode(*b)) {
            self.stats.framing_errors += 1;
            tracing::warn!(dropped = carried, "incomplete message abandoned");
            self.rx.drain(..carried);
            self.partial = 0;
        }
        Ok(())
    }

    /// Frames `block` and dispatches every message in it.
    ///
    /// Returns the length of an incomplete message at the end of the block.
    fn process_block(&mut self, block: &[u8], now: u64) -> usize {
        tracing::trace!(len = block.len(), "framing read block");
        let mut framer = Framer::new(block);
        let mut pending = 0;
        while let Some(item) = framer.next() {
            match item {
                Ok(frame) => {
                    self.stats.messages_received += 1;
                    self.dispatch(&frame, now);
                }
                Err(Error::Truncated { opcode, needed, available }) => {
                    tracing::trace!(opcode, needed, available, "waiting for rest of message");
                    pending = framer.remaining();
                }
                Err(err @ Error::ChecksumMismatch { .. }) => {
                    self.stats.checksum_errors += 1;
                    tracing::warn!(error = %err, "dropping rest of read block");
                }
                Err(err) => {
                    self.stats.framing_errors += 1;
                    tracing::warn!(error = %err, "framing error");
                }
            }
        }
        pending
    }

    fn dispatch(&mut self, frame: &Frame<'_>, now: u64) {
        let op = frame.opcode();
        tracing::trace!(opcode = opcode::name(op), payload = ?frame.payload(), "received");
        match op {
            OPC_LOCO_SPD => self.on_loco_speed(frame.arg(0), frame.arg(1), now),
            OPC_LOCO_DIRF => self.on_loco_dirf(frame.arg(0), frame.arg(1), now),
            OPC_LOCO_SND => self.on_loco_snd(frame.arg(0), frame.arg(1), now),
            OPC_MOVE_SLOTS => self.on_move_slots(frame.arg(0), frame.arg(1), now),
            OPC_RQ_SL_DATA => self.on_request_slot_data(frame.arg(0)),
            OPC_SLOT_STAT1 => self.on_slot_stat1(frame.arg(0), frame.arg(1), now),
            OPC_LOCO_ADR => self.on_loco_address(join_address(frame.arg(0), frame.arg(1)), now),
            // Echoed slot data is not consumed
            OPC_LONG_ACK | OPC_SL_RD_DATA | OPC_VENDOR_A3 | OPC_VENDOR_D4 | OPC_VENDOR_E6 => {
                tracing::trace!(opcode = op, "ignored");
            }
            _ => {
                self.stats.unhandled_opcodes += 1;
                tracing::debug!(opcode = op, "unhandled opcode");
            }
        }
    }

    fn on_loco_speed(&mut self, slot: u8, speed: u8, now: u64) {
        let result = if speed == EMERGENCY_STOP_SPEED {
            self.slots.emergency_stop(slot, now)
        } else {
            self.slots.set_locomotive_speed(slot, speed, now)
        };
        self.finish(OPC_LOCO_SPD, slot, result);
    }

    fn on_loco_dirf(&mut self, slot: u8, dirf: u8, now: u64) {
        let (forward, functions) = decode_dirf(dirf);
        let result = self
            .slots
            .set_forward(slot, forward, now)
            .and_then(|()| self.slots.set_functions(slot, &functions, 0, now));
        self.finish(OPC_LOCO_DIRF, slot, result);
    }

    fn on_loco_snd(&mut self, slot: u8, snd: u8, now: u64) {
        let result = self.slots.set_functions(slot, &decode_snd(snd), 5, now);
        self.finish(OPC_LOCO_SND, slot, result);
    }

    fn on_move_slots(&mut self, src: u8, dest: u8, now: u64) {
        let result = if src == dest && src != DISPATCH_SLOT {
            // Null move: the throttle claims the slot
            self.slots
                .set_slot_to_in_use(src, now)
                .and_then(|()| self.slots.make_slot_read_data_message(src))
                .map(|reply| self.send(reply))
        } else if src == DISPATCH_SLOT {
            tracing::debug!(dest, "dispatch get is not supported");
            Err(Error::UnsupportedMove { src, dest })
        } else if dest == DISPATCH_SLOT {
            self.slots.set_slot_free(src)
        } else {
            Err(Error::UnsupportedMove { src, dest })
        };

        match result {
            Ok(()) => self.notify_slot(src),
            Err(err) => self.nak(OPC_MOVE_SLOTS, &err),
        }
    }

    fn on_request_slot_data(&mut self, slot: u8) {
        let result = SlotManager::<S>::validate(slot)
            .and_then(|_| self.slots.make_slot_read_data_message(slot));
        match result {
            Ok(reply) => self.send(reply),
            Err(err) => self.nak(OPC_RQ_SL_DATA, &err),
        }
    }

    fn on_slot_stat1(&mut self, slot: u8, stat: u8, now: u64) {
        match self.slots.force_slot_state(slot, decode_stat1(stat), now) {
            Ok(()) => self.notify_slot(slot),
            Err(err) => self.nak(OPC_SLOT_STAT1, &err),
        }
    }

    fn on_loco_address(&mut self, address: u16, now: u64) {
        let result = self.slots.acquire_locomotive(address, now).and_then(|slot| {
            self.slots
                .make_slot_read_data_message(slot)
                .map(|reply| (slot, reply))
        });
        match result {
            Ok((slot, reply)) => {
                self.send(reply);
                self.notify_slot(slot);
            }
            Err(err) => self.nak(OPC_LOCO_ADR, &err),
        }
    }

    /// Completes a fire-and-forget request: notify on success, log on error.
    fn finish(&mut self, op: u8, slot: u8, result: Result<()>) {
        match result {
            Ok(()) => self.notify_slot(slot),
            Err(err) => {
                tracing::warn!(opcode = opcode::name(op), slot, error = %err, "request rejected");
            }
        }
    }

    fn nak(&mut self, op: u8, err: &Error) {
        tracing::warn!(opcode = opcode::name(op), error = %err, "sending NAK");
        match build(OPC_LONG_ACK, &[op & 0x7F, NAK_CODE]) {
            Ok(message) => {
                self.stats.naks_sent += 1;
                self.send(message);
            }
            Err(err) => tracing::error!(error = %err, "could not build NAK"),
        }
    }

    fn notify_slot(&mut self, index: u8) {
        if let Ok(snapshot) = self.slots.snapshot(index) {
            self.sink.slot_changed(&snapshot);
        }
    }
}
