//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `tcp`: tokio TCP connector/acceptor and the real-time ticker
//! - `simulated`: Logging-only servo/ESC output
//! - `rpi`: Raspberry Pi hardware PWM (requires `rpi` feature)

pub mod mock;
pub mod simulated;
pub mod tcp;

#[cfg(feature = "rpi")]
pub mod rpi;

pub use mock::*;
pub use simulated::*;
pub use tcp::*;

#[cfg(feature = "rpi")]
pub use rpi::*;
