//! Hardware abstraction traits for the two ends of the link.
//!
//! # Key Traits
//!
//! | Trait | Side | Purpose |
//! |-------|------|---------|
//! | [`InputDevice`] | sender | Racing wheel / pedals / paddle shifters |
//! | [`PulseOutput`] | receiver | Servo and ESC pulse-width outputs |
//! | [`Ticker`] | sender | Sampling cadence |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. On a Raspberry Pi, use `hal::rpi`
//! (requires the `rpi` feature).
//!
//! # Example
//!
//! ```rust
//! use rc_link::traits::PulseOutput;
//! use rc_link::hal::MockPulseOutput;
//!
//! let mut out = MockPulseOutput::new();
//! out.set_steering_pulse(1500).unwrap();
//! out.set_motor_pulse(1590).unwrap();
//! assert_eq!(out.motor_us, Some(1590));
//! ```

use serde::{Deserialize, Serialize};

/// One raw reading from the operator's input device.
///
/// Axis values are in the device's native units; calibration into
/// normalized ranges happens in [`AxisNormalizer`](crate::axis::AxisNormalizer).
///
/// # Default
///
/// Defaults to a device at rest under the default calibration: steering
/// centred, both pedals released (`+1.0`), no shift buttons held.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSample {
    /// Raw steering axis.
    pub steering: f32,
    /// Raw throttle pedal axis.
    pub gas: f32,
    /// Raw brake pedal axis.
    pub brake: f32,
    /// Shift-up button currently held.
    pub shift_up: bool,
    /// Shift-down button currently held.
    pub shift_down: bool,
}

impl Default for InputSample {
    fn default() -> Self {
        Self {
            steering: 0.0,
            gas: 1.0,
            brake: 1.0,
            shift_up: false,
            shift_down: false,
        }
    }
}

/// Operator input device trait.
///
/// Sampled once per drive tick. Implementations must not block for long:
/// the drive loop runs at a fixed cadence and a slow `sample` delays the
/// next command on the wire.
///
/// # Implementation Notes
///
/// - Button fields report the *held* level; edge detection is done by
///   [`GearStateMachine`](crate::gear::GearStateMachine)
/// - Returning an error skips the tick; the previous command is not resent
pub trait InputDevice {
    /// Error type for input operations.
    type Error: core::fmt::Debug;

    /// Read the current state of every axis and button.
    fn sample(&mut self) -> Result<InputSample, Self::Error>;
}

/// Pulse-width output trait for a steering servo and an ESC.
///
/// Both channels run at 50 Hz; only the high-time in microseconds is
/// controlled here.
///
/// # Implementation Notes
///
/// - Values arrive already clamped by the
///   [`ActuatorController`](crate::actuator::ActuatorController)
/// - `release` stops driving the pins; after it, further writes may fail
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rc_link::traits::PulseOutput;
///
/// struct MyPwm { /* hardware handles */ }
///
/// impl PulseOutput for MyPwm {
///     type Error = ();
///
///     fn set_steering_pulse(&mut self, pulse_us: u16) -> Result<(), ()> {
///         // Write servo channel...
///         Ok(())
///     }
///
///     fn set_motor_pulse(&mut self, pulse_us: u16) -> Result<(), ()> {
///         // Write ESC channel...
///         Ok(())
///     }
/// }
/// ```
pub trait PulseOutput {
    /// Error type for output operations.
    type Error: core::fmt::Debug;

    /// Set the steering servo pulse width in microseconds.
    fn set_steering_pulse(&mut self, pulse_us: u16) -> Result<(), Self::Error>;

    /// Set the ESC pulse width in microseconds.
    fn set_motor_pulse(&mut self, pulse_us: u16) -> Result<(), Self::Error>;

    /// Stop driving both outputs.
    ///
    /// Default implementation does nothing.
    fn release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Fixed-cadence tick source for the drive loop.
///
/// On desktop this wraps a tokio interval; tests use
/// [`MockTicker`](crate::hal::MockTicker), which never waits.
pub trait Ticker {
    /// Wait until the next tick is due.
    fn tick(&mut self) -> impl core::future::Future<Output = ()>;
}
