//! # loconet-bridge
//!
//! A Loconet command-station engine: it frames the byte stream from a
//! Loconet bus, keeps the 128-entry locomotive slot table, answers throttle
//! requests and hands slot changes to the host.
//!
//! ## Features
//!
//! - **Framing**: opcode-driven message lengths, checksum validation, noise skipping
//! - **Slot table**: address acquisition, IN_USE/COMMON/FREE transitions, inactivity purge
//! - **Throttle binding**: throttles created and released as slots change state
//! - **Outbound queue**: one message in flight at a time, strict FIFO
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without a bus:
//!
//! - `traits` - Transport, clock, throttle and event abstractions
//! - `opcode`, `packing` - Wire constants and byte layouts
//! - `writer`, `framing` - Outbound message building and inbound framing
//! - `slot`, `slot_manager` - Slot state and the slot table
//! - `dispatcher` - Outbound FIFO
//! - `engine` - Tick-driven engine that ties everything together
//! - `hal` - Mock implementations for testing
//!
//! ## Example
//!
//! ```rust
//! use loconet_bridge::{
//!     Config, ProtocolEngine,
//!     hal::{MockThrottleService, MockTransport, RecordingSink},
//!     opcode::OPC_LOCO_ADR,
//!     writer::build,
//! };
//!
//! let mut engine = ProtocolEngine::new(
//!     MockTransport::new().with_auto_complete(),
//!     MockThrottleService::new(),
//!     RecordingSink::new(),
//!     &Config::default().engine,
//! );
//!
//! // A throttle asks for address 3
//! let request = build(OPC_LOCO_ADR, &[0x00, 0x03]).unwrap();
//! engine.transport_mut().push_incoming(request.as_bytes());
//!
//! // Update in your main loop
//! engine.update(20).unwrap();
//! assert_eq!(engine.slot(1).unwrap().address, 3);
//! ```

#![warn(missing_docs)]

/// Shared configuration.
pub mod config;
/// Outbound FIFO with one message in flight.
pub mod dispatcher;
/// Tick-driven protocol engine.
pub mod engine;
/// Error types.
pub mod error;
/// Inbound message framing.
pub mod framing;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Opcode constants and message lengths.
pub mod opcode;
/// Bit layouts of packed payload bytes.
pub mod packing;
/// Single slot state and throttle binding.
pub mod slot;
/// The 128-entry slot table.
pub mod slot_manager;
/// Traits for the engine's collaborators.
pub mod traits;
/// Outbound message building and checksums.
pub mod writer;

/// Broker message types for slot events (serde-based).
#[cfg(feature = "serde")]
pub mod messages;

// Re-exports for convenience
pub use dispatcher::MessageDispatcher;
pub use engine::{EngineStats, ProtocolEngine};
pub use error::{Error, Result};
pub use framing::{Frame, Framer};
pub use slot::{Slot, SlotState, SlotView};
pub use slot_manager::SlotManager;
pub use traits::{
    Clock, NullSink, SlotEventSink, SlotSnapshot, ThrottleHandle, ThrottleListener,
    ThrottleService, Transport,
};
pub use writer::{MessageWriter, OutboundMessage};

// Config re-exports
pub use config::{Config, DeviceConfig, EngineConfig, SerialConfig};

#[cfg(feature = "serde")]
pub use messages::SlotChanged;
