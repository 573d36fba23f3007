//! Raw axis calibration and deadzone suppression.
//!
//! Input devices report axes in their own native range. [`AxisNormalizer`]
//! maps pedals to `[0, 1]` and steering to `[-1, 1]`, and snaps anything
//! inside a deadzone to exactly `0.0` so sensor noise never reaches the
//! actuator.
//!
//! The default pedal calibration matches a wheel whose pedals rest at
//! `+1.0` and read `-1.0` when floored:
//!
//! ```text
//! normalized = clamp((raw - 1) / -2, 0, 1)
//! ```
//!
//! # Example
//!
//! ```rust
//! use rc_link::axis::PedalCalibration;
//!
//! let pedal = PedalCalibration::default();
//! assert_eq!(pedal.normalize(1.0), 0.0);   // released
//! assert_eq!(pedal.normalize(-1.0), 1.0);  // floored
//! assert_eq!(pedal.normalize(0.95), 0.0);  // 0.025 is inside the deadzone
//! assert!((pedal.normalize(0.0) - 0.5).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

use crate::traits::InputSample;

/// Default pedal deadzone.
pub const DEFAULT_PEDAL_DEADZONE: f32 = 0.05;

/// Full steering lock in wire units (`0..=STEERING_RANGE`).
pub const STEERING_RANGE: u8 = 90;

/// Centre steering angle in wire units.
pub const STEERING_CENTER: u8 = STEERING_RANGE / 2;

/// Pedal calibration: raw value at rest, raw value fully pressed, deadzone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedalCalibration {
    /// Raw reading with the pedal released.
    pub released: f32,
    /// Raw reading with the pedal fully pressed.
    pub pressed: f32,
    /// Normalized values strictly below this are reported as `0.0`.
    pub deadzone: f32,
}

impl Default for PedalCalibration {
    fn default() -> Self {
        Self {
            released: 1.0,
            pressed: -1.0,
            deadzone: DEFAULT_PEDAL_DEADZONE,
        }
    }
}

impl PedalCalibration {
    /// Set the deadzone, clamped to `[0, 1]`.
    pub fn with_deadzone(mut self, deadzone: f32) -> Self {
        self.deadzone = deadzone.clamp(0.0, 1.0);
        self
    }

    /// Set the raw rest/pressed readings.
    pub fn with_range(mut self, released: f32, pressed: f32) -> Self {
        self.released = released;
        self.pressed = pressed;
        self
    }

    /// Map a raw reading into `[0, 1]`.
    ///
    /// A degenerate calibration (`released == pressed`) or a non-finite
    /// reading yields `0.0`.
    pub fn normalize(&self, raw: f32) -> f32 {
        let span = self.pressed - self.released;
        if span == 0.0 || !raw.is_finite() {
            return 0.0;
        }
        let value = ((raw - self.released) / span).clamp(0.0, 1.0);
        if value < self.deadzone {
            0.0
        } else {
            value
        }
    }
}

/// Steering calibration: raw range, optional inversion, centre deadzone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringCalibration {
    /// Raw reading at full left lock.
    pub min: f32,
    /// Raw reading at full right lock.
    pub max: f32,
    /// Negate the axis (for wheels that report right as negative).
    pub inverted: bool,
    /// Normalized magnitudes strictly below this are reported as `0.0`.
    pub deadzone: f32,
}

impl Default for SteeringCalibration {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
            inverted: false,
            deadzone: 0.0,
        }
    }
}

impl SteeringCalibration {
    /// Set axis inversion.
    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Set the centre deadzone, clamped to `[0, 1]`.
    pub fn with_deadzone(mut self, deadzone: f32) -> Self {
        self.deadzone = deadzone.clamp(0.0, 1.0);
        self
    }

    /// Map a raw reading into `[-1, 1]`.
    pub fn normalize(&self, raw: f32) -> f32 {
        let span = self.max - self.min;
        if span == 0.0 || !raw.is_finite() {
            return 0.0;
        }
        let mut value = (((raw - self.min) / span) * 2.0 - 1.0).clamp(-1.0, 1.0);
        if self.inverted {
            value = -value;
        }
        if value.abs() < self.deadzone {
            0.0
        } else {
            value
        }
    }
}

/// Convert normalized steering (`[-1, 1]`) into a wire angle (`0..=90`).
///
/// Truncates toward zero, so only a fully locked axis reaches `90`.
///
/// ```
/// use rc_link::axis::steering_angle;
///
/// assert_eq!(steering_angle(-1.0), 0);
/// assert_eq!(steering_angle(0.0), 45);
/// assert_eq!(steering_angle(1.0), 90);
/// ```
pub fn steering_angle(normalized: f32) -> u8 {
    let half = f32::from(STEERING_CENTER);
    let angle = (normalized.clamp(-1.0, 1.0) + 1.0) * half;
    (angle as u8).min(STEERING_RANGE)
}

/// One tick of normalized axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedAxes {
    /// Steering in `[-1, 1]`, `0.0` when centred.
    pub steering: f32,
    /// Throttle pedal in `[0, 1]`.
    pub gas: f32,
    /// Brake pedal in `[0, 1]`.
    pub brake: f32,
}

/// Applies per-axis calibration to a raw [`InputSample`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisNormalizer {
    /// Steering calibration.
    pub steering: SteeringCalibration,
    /// Throttle pedal calibration.
    pub gas: PedalCalibration,
    /// Brake pedal calibration.
    pub brake: PedalCalibration,
}

impl AxisNormalizer {
    /// Set the steering calibration.
    pub fn with_steering(mut self, steering: SteeringCalibration) -> Self {
        self.steering = steering;
        self
    }

    /// Set the throttle pedal calibration.
    pub fn with_gas(mut self, gas: PedalCalibration) -> Self {
        self.gas = gas;
        self
    }

    /// Set the brake pedal calibration.
    pub fn with_brake(mut self, brake: PedalCalibration) -> Self {
        self.brake = brake;
        self
    }

    /// Normalize all three axes of a sample.
    pub fn normalize(&self, sample: &InputSample) -> NormalizedAxes {
        NormalizedAxes {
            steering: self.steering.normalize(sample.steering),
            gas: self.gas.normalize(sample.gas),
            brake: self.brake.normalize(sample.brake),
        }
    }
}
