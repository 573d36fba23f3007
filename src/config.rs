//! Shared configuration for the sender and the receiver.
//!
//! Every section has sensible defaults, builder methods, and serde
//! support. A JSON file may contain any subset of fields; anything missing
//! falls back to its default.
//!
//! # Example
//!
//! ```rust
//! use rc_link::config::{ActuatorConfig, Config, LinkConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.link.port, 5050);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_link(LinkConfig::default().with_host("192.168.1.40"))
//!     .with_actuator(ActuatorConfig::default().with_watchdog_ms(0));
//!
//! // Or load a partial file
//! let config = Config::from_json_str(r#"{"link": {"port": 6000}}"#).unwrap();
//! assert_eq!(config.link.port, 6000);
//! assert_eq!(config.drive.tick_ms, 10);
//! ```

use std::path::{Path, PathBuf};

use heapless::String as HString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::{AxisNormalizer, PedalCalibration, SteeringCalibration};
use crate::encoder::{MotorMapping, MotorPolicy};
use crate::gear::FORWARD_GEARS;

/// Maximum length for short config strings (hostnames, bind addresses)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_SHORT_STRING)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Errors
// ============================================================================

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config text is not valid JSON for [`Config`].
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range or inconsistent with another.
    #[error("invalid config value: {0}")]
    Invalid(&'static str),
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network link configuration
    pub link: LinkConfig,
    /// Input calibration
    pub input: InputConfig,
    /// Sender drive loop and motor mapping
    pub drive: DriveConfig,
    /// Receiver outputs
    pub actuator: ActuatorConfig,
}

impl Config {
    /// Parse a full or partial JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.validate()?;
        self.drive.validate()?;
        self.actuator.validate()
    }

    /// Set link configuration
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    /// Set input configuration
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }

    /// Set drive configuration
    pub fn with_drive(mut self, drive: DriveConfig) -> Self {
        self.drive = drive;
        self
    }

    /// Set actuator configuration
    pub fn with_actuator(mut self, actuator: ActuatorConfig) -> Self {
        self.actuator = actuator;
        self
    }
}

// ============================================================================
// Link Config
// ============================================================================

/// TCP link configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Receiver hostname or IP (sender side)
    pub host: ShortString,
    /// Receiver port
    pub port: u16,
    /// Bind address (receiver side)
    pub listen: ShortString,
    /// Delay between reconnect attempts in milliseconds
    pub reconnect_backoff_ms: u32,
    /// Upper bound on a single connect attempt in milliseconds
    pub connect_timeout_ms: u32,
    /// Upper bound on a single record write in milliseconds
    pub write_timeout_ms: u32,
    /// Disable Nagle's algorithm on the sender socket
    pub nodelay: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: short_string("127.0.0.1"),
            port: 5050,
            listen: short_string("0.0.0.0"),
            reconnect_backoff_ms: 2000,
            connect_timeout_ms: 2000,
            write_timeout_ms: 500,
            nodelay: true,
        }
    }
}

impl LinkConfig {
    /// Set the receiver host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the receiver bind address
    pub fn with_listen(mut self, listen: &str) -> Self {
        self.listen = short_string(listen);
        self
    }

    /// Set the reconnect backoff
    pub fn with_reconnect_backoff_ms(mut self, ms: u32) -> Self {
        self.reconnect_backoff_ms = ms;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout_ms(mut self, ms: u32) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// `host:port` the sender connects to
    pub fn target_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `listen:port` the receiver binds
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

// ============================================================================
// Input Config
// ============================================================================

/// Input device calibration
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Steering axis calibration
    pub steering: SteeringCalibration,
    /// Throttle pedal calibration
    pub gas: PedalCalibration,
    /// Brake pedal calibration
    pub brake: PedalCalibration,
}

impl InputConfig {
    /// Set both pedal deadzones
    pub fn with_pedal_deadzone(mut self, deadzone: f32) -> Self {
        self.gas = self.gas.with_deadzone(deadzone);
        self.brake = self.brake.with_deadzone(deadzone);
        self
    }

    /// Invert the steering axis
    pub fn with_steering_inverted(mut self, inverted: bool) -> Self {
        self.steering = self.steering.with_inverted(inverted);
        self
    }

    /// Build the normalizer for these calibrations
    pub fn normalizer(&self) -> AxisNormalizer {
        AxisNormalizer::default()
            .with_steering(self.steering)
            .with_gas(self.gas)
            .with_brake(self.brake)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.gas.deadzone)
            || !unit.contains(&self.brake.deadzone)
            || !unit.contains(&self.steering.deadzone)
        {
            return Err(ConfigError::Invalid("deadzones must be within [0, 1]"));
        }
        if self.gas.released == self.gas.pressed || self.brake.released == self.brake.pressed {
            return Err(ConfigError::Invalid("pedal released and pressed readings must differ"));
        }
        if self.steering.min >= self.steering.max {
            return Err(ConfigError::Invalid("steering min must be below max"));
        }
        Ok(())
    }
}

// ============================================================================
// Drive Config
// ============================================================================

/// Sender drive loop configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Sampling period in milliseconds
    pub tick_ms: u32,
    /// Motor pulse mapping
    pub motor: MotorMapping,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            motor: MotorMapping::default(),
        }
    }
}

impl DriveConfig {
    /// Set the sampling period
    pub fn with_tick_ms(mut self, ms: u32) -> Self {
        self.tick_ms = ms;
        self
    }

    /// Set the forward mapping policy
    pub fn with_policy(mut self, policy: MotorPolicy) -> Self {
        self.motor = self.motor.with_policy(policy);
        self
    }

    /// Set the per-gear speed factors
    pub fn with_gear_factors(mut self, factors: [f32; FORWARD_GEARS]) -> Self {
        self.motor = self.motor.with_gear_factors(factors);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick period must be non-zero"));
        }
        let m = &self.motor;
        if m.ceiling < m.neutral {
            return Err(ConfigError::Invalid("forward ceiling below neutral"));
        }
        if m.reverse_span > m.neutral {
            return Err(ConfigError::Invalid("reverse span larger than neutral pulse"));
        }
        if !(0.0..=1.0).contains(&m.reverse_gate) {
            return Err(ConfigError::Invalid("reverse gate must be within [0, 1]"));
        }
        if m.gear_factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(ConfigError::Invalid("gear factors must be positive"));
        }
        if let MotorPolicy::Banded { run_threshold, .. } = m.policy {
            if !(0.0..=1.0).contains(&run_threshold) {
                return Err(ConfigError::Invalid("run threshold must be within [0, 1]"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Actuator Config
// ============================================================================

/// Receiver output configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Servo pulse at steering angle 0 (µs)
    pub steering_min_us: u16,
    /// Servo pulse at steering angle 90 (µs)
    pub steering_max_us: u16,
    /// Lowest ESC pulse (full reverse, µs)
    pub motor_min_us: u16,
    /// ESC neutral pulse (µs)
    pub motor_neutral_us: u16,
    /// Highest ESC pulse (full forward, µs)
    pub motor_max_us: u16,
    /// How long neutral is held at startup to arm the ESC
    pub arm_ms: u32,
    /// Safe state after this long without a record; 0 disables
    pub watchdog_ms: u32,
    /// BCM pin driving the steering servo
    pub servo_pin: u8,
    /// BCM pin driving the ESC
    pub esc_pin: u8,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            steering_min_us: 600,
            steering_max_us: 2400,
            motor_min_us: 1000,
            motor_neutral_us: 1500,
            motor_max_us: 2000,
            arm_ms: 2000,
            watchdog_ms: 500,
            servo_pin: 19,
            esc_pin: 18,
        }
    }
}

impl ActuatorConfig {
    /// Set the servo pulse range
    pub fn with_steering_range(mut self, min_us: u16, max_us: u16) -> Self {
        self.steering_min_us = min_us;
        self.steering_max_us = max_us;
        self
    }

    /// Set the ESC pulse range and neutral
    pub fn with_motor_range(mut self, min_us: u16, neutral_us: u16, max_us: u16) -> Self {
        self.motor_min_us = min_us;
        self.motor_neutral_us = neutral_us;
        self.motor_max_us = max_us;
        self
    }

    /// Set the ESC arming hold
    pub fn with_arm_ms(mut self, ms: u32) -> Self {
        self.arm_ms = ms;
        self
    }

    /// Set the frame watchdog (0 disables)
    pub fn with_watchdog_ms(mut self, ms: u32) -> Self {
        self.watchdog_ms = ms;
        self
    }

    /// Servo pulse for a centred wheel (µs)
    pub fn steering_center_us(&self) -> u16 {
        let min = u32::from(self.steering_min_us);
        let max = u32::from(self.steering_max_us);
        ((min + max) / 2) as u16
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.steering_min_us >= self.steering_max_us {
            return Err(ConfigError::Invalid("steering pulse min must be below max"));
        }
        if self.motor_min_us >= self.motor_max_us {
            return Err(ConfigError::Invalid("motor pulse min must be below max"));
        }
        if !(self.motor_min_us..=self.motor_max_us).contains(&self.motor_neutral_us) {
            return Err(ConfigError::Invalid("motor neutral outside [min, max]"));
        }
        if self.servo_pin == self.esc_pin {
            return Err(ConfigError::Invalid("servo and ESC must use different pins"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.link.port, 5050);
        assert_eq!(config.drive.tick_ms, 10);
        assert_eq!(config.actuator.motor_neutral_us, 1500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_respects_char_boundary() {
        let input = "é".repeat(40); // 80 bytes
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_link(
                LinkConfig::default()
                    .with_host("car.local")
                    .with_port(6000)
                    .with_nodelay(false),
            )
            .with_drive(DriveConfig::default().with_tick_ms(20))
            .with_actuator(ActuatorConfig::default().with_arm_ms(0));

        assert_eq!(config.link.host.as_str(), "car.local");
        assert_eq!(config.link.target_address(), "car.local:6000");
        assert!(!config.link.nodelay);
        assert_eq!(config.drive.tick_ms, 20);
        assert_eq!(config.actuator.arm_ms, 0);
    }

    // =========================================================================
    // LinkConfig Tests
    // =========================================================================

    #[test]
    fn link_config_default() {
        let link = LinkConfig::default();
        assert_eq!(link.reconnect_backoff_ms, 2000);
        assert_eq!(link.connect_timeout_ms, 2000);
        assert_eq!(link.write_timeout_ms, 500);
        assert!(link.nodelay);
        assert_eq!(link.bind_address(), "0.0.0.0:5050");
    }

    // =========================================================================
    // InputConfig Tests
    // =========================================================================

    #[test]
    fn input_config_builds_normalizer() {
        let input = InputConfig::default()
            .with_pedal_deadzone(0.1)
            .with_steering_inverted(true);
        let normalizer = input.normalizer();
        assert_eq!(normalizer.gas.deadzone, 0.1);
        assert_eq!(normalizer.brake.deadzone, 0.1);
        assert!(normalizer.steering.inverted);
    }

    #[test]
    fn input_config_rejects_degenerate_pedal() {
        let mut config = Config::default();
        config.input.gas = config.input.gas.with_range(0.0, 0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    // =========================================================================
    // DriveConfig Tests
    // =========================================================================

    #[test]
    fn drive_config_rejects_zero_tick() {
        let config = Config::default().with_drive(DriveConfig::default().with_tick_ms(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn drive_config_rejects_threshold_out_of_range() {
        let policy = MotorPolicy::Banded {
            run_threshold: 1.5,
            scale_origin: 0.5,
            band_base: 1575,
            band_width: 25,
        };
        let config = Config::default().with_drive(DriveConfig::default().with_policy(policy));
        assert!(config.validate().is_err());
    }

    #[test]
    fn drive_config_rejects_non_positive_factor() {
        let config = Config::default()
            .with_drive(DriveConfig::default().with_gear_factors([1.0, 2.0, 0.0, 4.0, 5.0]));
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // ActuatorConfig Tests
    // =========================================================================

    #[test]
    fn actuator_config_default() {
        let actuator = ActuatorConfig::default();
        assert_eq!(actuator.steering_min_us, 600);
        assert_eq!(actuator.steering_max_us, 2400);
        assert_eq!(actuator.steering_center_us(), 1500);
        assert_eq!(actuator.watchdog_ms, 500);
        assert_eq!(actuator.servo_pin, 19);
        assert_eq!(actuator.esc_pin, 18);
    }

    #[test]
    fn actuator_config_rejects_inverted_range() {
        let config = Config::default()
            .with_actuator(ActuatorConfig::default().with_steering_range(2400, 600));
        assert!(config.validate().is_err());

        let config = Config::default()
            .with_actuator(ActuatorConfig::default().with_motor_range(1000, 2100, 2000));
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // JSON Loading Tests
    // =========================================================================

    #[test]
    fn from_json_partial() {
        let config = Config::from_json_str(
            r#"{
                "link": {"host": "10.0.0.7"},
                "drive": {"motor": {"policy": {"kind": "linear", "forward_span": 50}}},
                "actuator": {"watchdog_ms": 0}
            }"#,
        )
        .unwrap();
        assert_eq!(config.link.host.as_str(), "10.0.0.7");
        assert_eq!(config.link.port, 5050);
        assert_eq!(config.drive.motor.policy, MotorPolicy::linear());
        assert_eq!(config.drive.motor.neutral, 1500);
        assert_eq!(config.actuator.watchdog_ms, 0);
    }

    #[test]
    fn from_json_empty_object_is_default() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn from_json_rejects_invalid_values() {
        let err = Config::from_json_str(r#"{"drive": {"tick_ms": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn from_json_rejects_syntax_error() {
        let err = Config::from_json_str("{link").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_json_file_missing() {
        let err = Config::from_json_file("/nonexistent/rclink.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("rclink.json"));
    }

    #[test]
    fn config_json_roundtrip_keeps_policy_tag() {
        let text = serde_json::to_string(&Config::default()).unwrap();
        assert!(text.contains(r#""kind":"banded""#));
    }
}
