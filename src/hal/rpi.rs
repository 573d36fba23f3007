//! Raspberry Pi hardware PWM output.
//!
//! Drives the steering servo and the ESC from the SoC's two hardware PWM
//! channels at 50 Hz. Requires the `rpi` feature and the PWM overlay
//! (`dtoverlay=pwm-2chan`) enabled in `/boot/config.txt`.
//!
//! | BCM pin | Channel |
//! |---------|---------|
//! | 12, 18 | `Pwm0` |
//! | 13, 19 | `Pwm1` |

use std::time::Duration;

use rppal::pwm::{Channel, Polarity, Pwm};
use thiserror::Error;

use crate::config::ActuatorConfig;
use crate::traits::PulseOutput;

/// Servo/ESC frame period (50 Hz).
pub const FRAME_PERIOD: Duration = Duration::from_millis(20);

/// Errors from the Pi PWM backend.
#[derive(Error, Debug)]
pub enum RpiError {
    /// The PWM peripheral rejected an operation.
    #[error("pwm: {0}")]
    Pwm(#[from] rppal::pwm::Error),

    /// The pin has no hardware PWM channel.
    #[error("BCM pin {0} has no hardware PWM channel")]
    UnsupportedPin(u8),

    /// Servo and ESC would share a channel.
    #[error("servo and ESC pins map to the same PWM channel")]
    SharedChannel,
}

fn channel_for(pin: u8) -> Result<Channel, RpiError> {
    match pin {
        12 | 18 => Ok(Channel::Pwm0),
        13 | 19 => Ok(Channel::Pwm1),
        other => Err(RpiError::UnsupportedPin(other)),
    }
}

fn pulse(us: u16) -> Duration {
    Duration::from_micros(u64::from(us))
}

/// Hardware PWM servo + ESC output.
#[derive(Debug)]
pub struct RpiPwmOutput {
    servo: Pwm,
    esc: Pwm,
}

impl RpiPwmOutput {
    /// Open both channels, already enabled at centre/neutral.
    pub fn open(config: &ActuatorConfig) -> Result<Self, RpiError> {
        let servo_channel = channel_for(config.servo_pin)?;
        let esc_channel = channel_for(config.esc_pin)?;
        if servo_channel == esc_channel {
            return Err(RpiError::SharedChannel);
        }

        let servo = Pwm::with_period(
            servo_channel,
            FRAME_PERIOD,
            pulse(config.steering_center_us()),
            Polarity::Normal,
            true,
        )?;
        let esc = Pwm::with_period(
            esc_channel,
            FRAME_PERIOD,
            pulse(config.motor_neutral_us),
            Polarity::Normal,
            true,
        )?;

        tracing::info!(
            servo_pin = config.servo_pin,
            esc_pin = config.esc_pin,
            "hardware PWM opened"
        );
        Ok(Self { servo, esc })
    }
}

impl PulseOutput for RpiPwmOutput {
    type Error = RpiError;

    fn set_steering_pulse(&mut self, pulse_us: u16) -> Result<(), RpiError> {
        self.servo.set_pulse_width(pulse(pulse_us))?;
        Ok(())
    }

    fn set_motor_pulse(&mut self, pulse_us: u16) -> Result<(), RpiError> {
        self.esc.set_pulse_width(pulse(pulse_us))?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), RpiError> {
        self.esc.disable()?;
        self.servo.disable()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_to_channel() {
        assert_eq!(channel_for(18).unwrap(), Channel::Pwm0);
        assert_eq!(channel_for(19).unwrap(), Channel::Pwm1);
        assert!(matches!(channel_for(4), Err(RpiError::UnsupportedPin(4))));
    }

    #[test]
    fn pulse_duration() {
        assert_eq!(pulse(1500), Duration::from_micros(1500));
    }
}
