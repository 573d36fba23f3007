//! Desktop stand-in for the servo and ESC.
//!
//! Logs pulse changes through `tracing` instead of driving pins, so the
//! receiver can be run and watched on any machine.

use core::convert::Infallible;

use crate::traits::PulseOutput;

/// Pulse output that only logs.
///
/// Repeated writes of the same value are logged at `trace`; changes at
/// `debug`.
#[derive(Debug, Default)]
pub struct SimulatedOutput {
    steering_us: Option<u16>,
    motor_us: Option<u16>,
}

impl SimulatedOutput {
    /// Creates a new simulated output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last steering pulse.
    pub fn steering_us(&self) -> Option<u16> {
        self.steering_us
    }

    /// Last motor pulse.
    pub fn motor_us(&self) -> Option<u16> {
        self.motor_us
    }
}

impl PulseOutput for SimulatedOutput {
    type Error = Infallible;

    fn set_steering_pulse(&mut self, pulse_us: u16) -> Result<(), Infallible> {
        if self.steering_us.replace(pulse_us) == Some(pulse_us) {
            tracing::trace!(pulse_us, "servo");
        } else {
            tracing::debug!(pulse_us, "servo");
        }
        Ok(())
    }

    fn set_motor_pulse(&mut self, pulse_us: u16) -> Result<(), Infallible> {
        if self.motor_us.replace(pulse_us) == Some(pulse_us) {
            tracing::trace!(pulse_us, "esc");
        } else {
            tracing::debug!(pulse_us, "esc");
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), Infallible> {
        tracing::info!("simulated outputs released");
        Ok(())
    }
}
