//! Trait definitions for the engine's external collaborators.
//!
//! The engine never talks to hardware or to the throttle owner directly;
//! every side effect goes through one of these seams so the whole engine
//! can run against the mocks in [`crate::hal::mock`].
//!
//! # Submodules
//!
//! - `transport`: byte transport to the bus and the tick source
//! - `throttle`: throttle lifecycle service and notification surface
//! - `events`: outward "slot changed" notifications
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Transport`] | Non-blocking serial read/write with idle polling |
//! | [`Clock`] | Monotonic tick source |
//! | [`ThrottleService`] | Creates and releases throttles bound to slots |
//! | [`ThrottleListener`] | Receives slot changes for one throttle |
//! | [`SlotEventSink`] | Receives "slot N changed" events |

pub mod events;
pub mod throttle;
pub mod transport;

pub use events::*;
pub use throttle::*;
pub use transport::*;
