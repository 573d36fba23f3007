//! The per-tick control command.
//!
//! A [`ControlCommand`] is produced once per sampling tick by the
//! [`CommandEncoder`](crate::encoder::CommandEncoder), handed to the
//! [`TransportLink`](crate::transport::TransportLink), and never modified
//! afterwards. It carries both the already-mapped motor pulse and the raw
//! pedal values so the receiver can log what the operator was doing.

use crate::axis::{STEERING_CENTER, STEERING_RANGE};
use crate::gear::Gear;

/// One sampled, encoded control command.
///
/// # Invariants
///
/// - `steering_angle` is in `0..=90`
/// - `gas` and `brake` are in `[0, 1]`, rounded to two decimals
/// - `motor_pulse` was clamped by the encoder's policy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlCommand {
    /// Steering angle, `0` = full left, `45` = centre, `90` = full right.
    pub steering_angle: u8,
    /// ESC pulse width in microseconds.
    pub motor_pulse: u16,
    /// Gear selected when the command was sampled.
    pub gear: Gear,
    /// Throttle pedal position.
    pub gas: f32,
    /// Brake pedal position.
    pub brake: f32,
}

impl ControlCommand {
    /// Centred steering, neutral gear, motor at `neutral_pulse`, pedals released.
    ///
    /// ```
    /// use rc_link::{ControlCommand, gear::Gear};
    ///
    /// let idle = ControlCommand::idle(1500);
    /// assert_eq!(idle.steering_angle, 45);
    /// assert_eq!(idle.gear, Gear::Neutral);
    /// ```
    pub fn idle(neutral_pulse: u16) -> Self {
        Self {
            steering_angle: STEERING_CENTER,
            motor_pulse: neutral_pulse,
            gear: Gear::Neutral,
            gas: 0.0,
            brake: 0.0,
        }
    }

    /// Copy with the steering angle clamped into `0..=90`.
    #[must_use]
    pub fn with_steering(mut self, angle: u8) -> Self {
        self.steering_angle = angle.min(STEERING_RANGE);
        self
    }
}

/// Round a pedal value to two decimals, as carried on the wire.
#[inline]
pub fn round_pedal(value: f32) -> f32 {
    ((value.clamp(0.0, 1.0) * 100.0).round()) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_centred_neutral() {
        let cmd = ControlCommand::idle(1500);
        assert_eq!(cmd.steering_angle, 45);
        assert_eq!(cmd.motor_pulse, 1500);
        assert_eq!(cmd.gear, Gear::Neutral);
        assert_eq!(cmd.gas, 0.0);
        assert_eq!(cmd.brake, 0.0);
    }

    #[test]
    fn with_steering_clamps() {
        let cmd = ControlCommand::idle(1500).with_steering(200);
        assert_eq!(cmd.steering_angle, 90);
    }

    #[test]
    fn round_pedal_two_decimals() {
        assert_eq!(round_pedal(0.456), 0.46);
        assert_eq!(round_pedal(0.0), 0.0);
        assert_eq!(round_pedal(1.7), 1.0);
        assert_eq!(round_pedal(-0.2), 0.0);
    }
}
