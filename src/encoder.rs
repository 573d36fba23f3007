//! Gear-dependent motor pulse mapping.
//!
//! [`CommandEncoder`] turns normalized axes plus the current gear into a
//! [`ControlCommand`]. Steering maps linearly to `0..=90`. The motor pulse
//! depends on the gear:
//!
//! | Gear | Motor pulse |
//! |------|-------------|
//! | `N` | always neutral |
//! | `R` | `neutral - reverse_span * gas`, brake ignored |
//! | `1`..`5` | policy-specific forward mapping, minus brake, clamped to `[neutral, ceiling]` |
//!
//! # Banded policy (default)
//!
//! The forward mapping is a two-stage gate:
//!
//! 1. Gas at or below the run threshold (0.6) yields neutral, so a resting
//!    foot never creeps the car.
//! 2. Above the threshold, gas is rescaled as `(gas - 0.5) * 2` and clamped
//!    to `[0, 1]`, then interpolated into the gear's pulse band
//!    `[base + (factor - 1) * width, base + factor * width]`.
//!
//! With the defaults (`base = 1575`, `width = 25`, factors `1..=5`) first
//! gear spans 1575–1600 and fifth gear 1675–1700. Brake then subtracts
//! `50 * brake` and the result is clamped to `[1500, 2000]`.
//!
//! # Linear policy
//!
//! The older direct mapping: `neutral + 50 * factor * gas - 50 * brake`.
//!
//! # Example
//!
//! ```rust
//! use rc_link::axis::NormalizedAxes;
//! use rc_link::encoder::CommandEncoder;
//! use rc_link::gear::Gear;
//!
//! let encoder = CommandEncoder::default();
//! let axes = NormalizedAxes { steering: 0.0, gas: 0.8, brake: 0.0 };
//!
//! let cmd = encoder.encode(&axes, Gear::First);
//! assert_eq!(cmd.motor_pulse, 1590);
//! assert_eq!(cmd.steering_angle, 45);
//!
//! let cmd = encoder.encode(&axes, Gear::Neutral);
//! assert_eq!(cmd.motor_pulse, 1500);
//! ```

use serde::{Deserialize, Serialize};

use crate::axis::{steering_angle, NormalizedAxes};
use crate::commands::{round_pedal, ControlCommand};
use crate::gear::{Gear, FORWARD_GEARS};

/// Neutral ESC pulse (µs).
pub const PWM_NEUTRAL: u16 = 1500;

/// Highest forward pulse the sender will ever emit (µs).
pub const PWM_FORWARD_CEILING: u16 = 2000;

/// Forward-gear mapping strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotorPolicy {
    /// Run-threshold gate followed by a per-gear pulse band.
    Banded {
        /// Gas must exceed this before the car moves.
        run_threshold: f32,
        /// Origin of the `(gas - origin) * 2` rescale.
        scale_origin: f32,
        /// Lower edge of first gear's band (µs).
        band_base: u16,
        /// Width of every gear band (µs).
        band_width: u16,
    },
    /// Direct proportional mapping scaled by the gear factor.
    Linear {
        /// Pulse added at full gas with factor 1 (µs).
        forward_span: u16,
    },
}

impl MotorPolicy {
    /// The default banded policy.
    pub const fn banded() -> Self {
        MotorPolicy::Banded {
            run_threshold: 0.6,
            scale_origin: 0.5,
            band_base: 1575,
            band_width: 25,
        }
    }

    /// The legacy linear policy.
    pub const fn linear() -> Self {
        MotorPolicy::Linear { forward_span: 50 }
    }
}

impl Default for MotorPolicy {
    fn default() -> Self {
        Self::banded()
    }
}

/// Motor mapping parameters shared by both policies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorMapping {
    /// Neutral pulse (µs).
    pub neutral: u16,
    /// Forward output is clamped to `[neutral, ceiling]`.
    pub ceiling: u16,
    /// Full-gas reverse offset below neutral (µs).
    pub reverse_span: u16,
    /// Reverse engages only when gas is strictly above this.
    pub reverse_gate: f32,
    /// Full-brake offset subtracted in forward gears (µs).
    pub brake_span: u16,
    /// Speed factor of gears `1`..`5`.
    pub gear_factors: [f32; FORWARD_GEARS],
    /// Forward mapping strategy.
    pub policy: MotorPolicy,
}

impl Default for MotorMapping {
    fn default() -> Self {
        Self {
            neutral: PWM_NEUTRAL,
            ceiling: PWM_FORWARD_CEILING,
            reverse_span: 40,
            reverse_gate: 0.05,
            brake_span: 50,
            gear_factors: [1.0, 2.0, 3.0, 4.0, 5.0],
            policy: MotorPolicy::banded(),
        }
    }
}

impl MotorMapping {
    /// Parameters of the older linear client: reverse and brake span 50.
    pub fn legacy_linear() -> Self {
        Self {
            reverse_span: 50,
            policy: MotorPolicy::linear(),
            ..Self::default()
        }
    }

    /// Set the forward policy.
    pub fn with_policy(mut self, policy: MotorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-gear speed factors.
    pub fn with_gear_factors(mut self, factors: [f32; FORWARD_GEARS]) -> Self {
        self.gear_factors = factors;
        self
    }

    /// Speed factor of `gear`, `None` for reverse and neutral.
    pub fn factor(&self, gear: Gear) -> Option<f32> {
        gear.forward_ordinal()
            .and_then(|ordinal| self.gear_factors.get(ordinal - 1).copied())
    }

    /// Pulse band `(min, max)` of a forward gear under the banded policy.
    ///
    /// Returns `None` for reverse, neutral, or when the policy is linear.
    ///
    /// ```
    /// use rc_link::encoder::MotorMapping;
    /// use rc_link::gear::Gear;
    ///
    /// let mapping = MotorMapping::default();
    /// assert_eq!(mapping.gear_band(Gear::First), Some((1575.0, 1600.0)));
    /// assert_eq!(mapping.gear_band(Gear::Third), Some((1625.0, 1650.0)));
    /// assert_eq!(mapping.gear_band(Gear::Neutral), None);
    /// ```
    pub fn gear_band(&self, gear: Gear) -> Option<(f32, f32)> {
        let MotorPolicy::Banded {
            band_base,
            band_width,
            ..
        } = self.policy
        else {
            return None;
        };
        let factor = self.factor(gear)?;
        let width = f32::from(band_width);
        let min = f32::from(band_base) + (factor - 1.0) * width;
        Some((min, min + width))
    }

    /// Motor pulse for `gear` with normalized pedals.
    pub fn motor_pulse(&self, gear: Gear, gas: f32, brake: f32) -> u16 {
        let neutral = i32::from(self.neutral);
        match gear {
            Gear::Neutral => self.neutral,
            Gear::Reverse => {
                if gas <= self.reverse_gate {
                    return self.neutral;
                }
                let span = i32::from(self.reverse_span);
                let pulse = neutral - (f32::from(self.reverse_span) * gas) as i32;
                clamp_pulse(pulse, neutral - span, neutral)
            }
            forward => {
                let factor = self.factor(forward).unwrap_or(1.0);
                let driven = match self.policy {
                    MotorPolicy::Banded {
                        run_threshold,
                        scale_origin,
                        ..
                    } => {
                        if gas > run_threshold {
                            let scaled = ((gas - scale_origin) * 2.0).clamp(0.0, 1.0);
                            let (min, max) = self
                                .gear_band(forward)
                                .unwrap_or((f32::from(self.neutral), f32::from(self.neutral)));
                            (min + (max - min) * scaled) as i32
                        } else {
                            neutral
                        }
                    }
                    MotorPolicy::Linear { forward_span } => {
                        neutral + (f32::from(forward_span) * factor * gas) as i32
                    }
                };
                let braked = driven - (f32::from(self.brake_span) * brake) as i32;
                clamp_pulse(braked, neutral, i32::from(self.ceiling))
            }
        }
    }
}

fn clamp_pulse(pulse: i32, min: i32, max: i32) -> u16 {
    let clamped = pulse.clamp(min.min(max), max.max(min));
    u16::try_from(clamped.max(0)).unwrap_or(u16::MAX)
}

/// Builds a [`ControlCommand`] from normalized axes and the current gear.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CommandEncoder {
    mapping: MotorMapping,
}

impl CommandEncoder {
    /// Encoder with the given motor mapping.
    pub fn new(mapping: MotorMapping) -> Self {
        Self { mapping }
    }

    /// The motor mapping in use.
    pub fn mapping(&self) -> &MotorMapping {
        &self.mapping
    }

    /// Encode one tick.
    pub fn encode(&self, axes: &NormalizedAxes, gear: Gear) -> ControlCommand {
        ControlCommand {
            steering_angle: steering_angle(axes.steering),
            motor_pulse: self.mapping.motor_pulse(gear, axes.gas, axes.brake),
            gear,
            gas: round_pedal(axes.gas),
            brake: round_pedal(axes.brake),
        }
    }
}
