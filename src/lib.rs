//! # rc-link
//!
//! A remote-control link for a hobby RC car: a racing wheel on the operator
//! station drives the car's steering servo and ESC over TCP.
//!
//! ## Features
//!
//! - **Virtual gearbox**: Edge-triggered paddle shifting through `R N 1 2 3 4 5`
//! - **Calibrated input**: Per-axis range mapping and deadzones
//! - **Banded motor mapping**: Run threshold plus a per-gear pulse band
//! - **Self-healing link**: Fixed-backoff reconnect, no queued commands
//! - **Fail-safe receiver**: Re-clamps everything, safe state on every exit path
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `gear`, `axis`, `encoder`, `commands` - Pure sender-side core
//! - `messages`, `framing` - Wire record codec and line reassembly
//! - `transport` - Sender link with reconnect
//! - `actuator` - Receiver mapping and safe state
//! - `services` - The drive loop and the receiver loop
//! - `hal` - Concrete implementations (mock, TCP, simulated, Raspberry Pi)
//!
//! ## Example
//!
//! ```rust
//! use rc_link::{
//!     ActuatorController, AxisNormalizer, CommandEncoder, GearStateMachine,
//!     config::ActuatorConfig,
//!     hal::MockPulseOutput,
//!     messages::{decode_record, encode_record},
//!     traits::InputSample,
//! };
//!
//! // Sender: floor the throttle and click up into first
//! let mut gears = GearStateMachine::new();
//! let sample = InputSample { gas: -1.0, shift_up: true, ..InputSample::default() };
//! let gear = gears.update(sample.shift_up, sample.shift_down);
//! let axes = AxisNormalizer::default().normalize(&sample);
//! let cmd = CommandEncoder::default().encode(&axes, gear);
//! let line = encode_record(&cmd).unwrap();
//!
//! // Receiver: decode and drive the outputs
//! let mut actuator = ActuatorController::new(MockPulseOutput::new(), ActuatorConfig::default());
//! actuator.apply(&decode_record(line.trim_end().as_bytes()).unwrap()).unwrap();
//! assert_eq!(actuator.output().motor_us, Some(1600));
//! ```

#![warn(missing_docs)]

/// Receiver mapping from wire records to bounded servo/ESC pulses.
pub mod actuator;
/// Raw axis calibration and deadzones.
pub mod axis;
/// The per-tick control command.
pub mod commands;
/// Shared configuration for sender and receiver.
pub mod config;
/// Gear-dependent motor pulse mapping.
pub mod encoder;
/// Newline record reassembly over a byte stream.
pub mod framing;
/// Virtual gearbox with edge-triggered shifting.
pub mod gear;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Wire record encoding and decoding.
pub mod messages;
/// Drive loop, receiver loop, and the stdin input device.
pub mod services;
/// Core traits for hardware and network abstraction.
pub mod traits;
/// Sender link with reconnect.
pub mod transport;

// Re-exports for convenience
pub use actuator::{ActuatorController, FeedReport, OutputPulses};
pub use axis::{AxisNormalizer, NormalizedAxes, PedalCalibration, SteeringCalibration};
pub use commands::ControlCommand;
pub use encoder::{CommandEncoder, MotorMapping, MotorPolicy};
pub use gear::{Gear, GearStateMachine, Shift};
pub use messages::{FrameError, WireRecord};
pub use traits::{Acceptor, Connector, InputDevice, InputSample, PulseOutput, Ticker};
pub use transport::{LinkError, LinkState, TransportLink};

// Config re-exports
pub use config::{ActuatorConfig, Config, ConfigError, DriveConfig, InputConfig, LinkConfig};
