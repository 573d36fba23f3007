//! Trait definitions for hardware and network abstraction.
//!
//! These traits let the same drive loop and actuator server run against
//! real devices and sockets, or against the in-memory mocks in
//! [`crate::hal::mock`].
//!
//! # Submodules
//!
//! - `hardware`: Input device, pulse outputs, tick source
//! - `network`: Outbound connector and inbound acceptor
//!
//! # Hardware Abstraction
//!
//! - [`InputDevice`]: Wheel, pedals and shift buttons
//! - [`PulseOutput`]: Servo and ESC pulse widths
//! - [`Ticker`]: Sampling cadence
//!
//! # Network Abstraction
//!
//! - [`Connector`]: Produces a fresh stream to the vehicle on demand
//! - [`Acceptor`]: Yields inbound streams one at a time

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
