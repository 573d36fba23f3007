//! Wire record: one JSON object per line.
//!
//! ```json
//! {"steering":45,"motor":1590,"gear":"1","gas":0.8,"brake":0.0}
//! ```
//!
//! | field | type | default when missing |
//! |-------|------|----------------------|
//! | `steering` | integer | centre (45) |
//! | `motor` | integer | receiver's neutral pulse |
//! | `gear` | `"R"`, `"N"`, `"1"`..`"5"` | `"N"` |
//! | `gas` | float | 0.0 |
//! | `brake` | float | 0.0 |
//!
//! Unknown fields are ignored so older clients (which also send e.g.
//! `clutch`) stay compatible. Decoded integers are kept as wide signed
//! values: the receiver clamps them, it never trusts the sender.
//!
//! # Example
//!
//! ```
//! use rc_link::messages::{decode_record, encode_record};
//! use rc_link::{ControlCommand, gear::Gear};
//!
//! let cmd = ControlCommand::idle(1500);
//! let line = encode_record(&cmd).unwrap();
//! assert!(line.ends_with('\n'));
//!
//! let record = decode_record(line.trim_end().as_bytes()).unwrap();
//! assert_eq!(record.gear, Gear::Neutral);
//! assert_eq!(record.steering, Some(45));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::ControlCommand;
use crate::gear::Gear;

/// Record delimiter.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// A decoded (or about to be encoded) wire record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Steering angle as sent; may be out of range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering: Option<i64>,
    /// Motor pulse as sent; may be out of range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor: Option<i64>,
    /// Selected gear.
    #[serde(default)]
    pub gear: Gear,
    /// Throttle pedal position.
    #[serde(default)]
    pub gas: f32,
    /// Brake pedal position.
    #[serde(default)]
    pub brake: f32,
}

impl From<&ControlCommand> for WireRecord {
    fn from(cmd: &ControlCommand) -> Self {
        Self {
            steering: Some(i64::from(cmd.steering_angle)),
            motor: Some(i64::from(cmd.motor_pulse)),
            gear: cmd.gear,
            gas: cmd.gas,
            brake: cmd.brake,
        }
    }
}

/// Errors decoding a single record.
///
/// A record error never ends a session: the line is dropped and the
/// receiver moves on to the next one.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The line is not valid UTF-8.
    #[error("record is not valid UTF-8")]
    Utf8(#[from] core::str::Utf8Error),

    /// The line is not a valid record object.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    /// A partial record grew past the receive buffer.
    #[error("record exceeds {limit} bytes")]
    Overflow {
        /// Buffer capacity in bytes.
        limit: usize,
    },
}

/// Serialize a command as one newline-terminated record.
pub fn encode_record(cmd: &ControlCommand) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(&WireRecord::from(cmd))?;
    line.push(char::from(RECORD_TERMINATOR));
    Ok(line)
}

/// Parse one record (without its terminator).
///
/// Surrounding whitespace, including a trailing `\r`, is tolerated.
pub fn decode_record(line: &[u8]) -> Result<WireRecord, FrameError> {
    let text = core::str::from_utf8(line)?;
    Ok(serde_json::from_str(text.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_has_all_fields() {
        let cmd = ControlCommand {
            steering_angle: 30,
            motor_pulse: 1590,
            gear: Gear::First,
            gas: 0.8,
            brake: 0.0,
        };
        let line = encode_record(&cmd).unwrap();
        assert_eq!(
            line,
            "{\"steering\":30,\"motor\":1590,\"gear\":\"1\",\"gas\":0.8,\"brake\":0.0}\n"
        );
    }

    #[test]
    fn decode_full_record() {
        let record =
            decode_record(br#"{"steering": 90, "motor": 1700, "gear": "5", "gas": 1.0, "brake": 0.25}"#)
                .unwrap();
        assert_eq!(record.steering, Some(90));
        assert_eq!(record.motor, Some(1700));
        assert_eq!(record.gear, Gear::Fifth);
        assert_eq!(record.brake, 0.25);
    }

    #[test]
    fn decode_applies_defaults() {
        let record = decode_record(b"{}").unwrap();
        assert_eq!(record.steering, None);
        assert_eq!(record.motor, None);
        assert_eq!(record.gear, Gear::Neutral);
        assert_eq!(record.gas, 0.0);
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let record = decode_record(br#"{"steering":45,"motor":1350,"gear":"N","clutch":1}"#).unwrap();
        assert_eq!(record.motor, Some(1350));
    }

    #[test]
    fn decode_keeps_out_of_range_values() {
        let record = decode_record(br#"{"steering":-400,"motor":99999,"gear":"2"}"#).unwrap();
        assert_eq!(record.steering, Some(-400));
        assert_eq!(record.motor, Some(99999));
    }

    #[test]
    fn decode_tolerates_crlf() {
        let record = decode_record(b"{\"gear\":\"R\"}\r").unwrap();
        assert_eq!(record.gear, Gear::Reverse);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_record(b"not json"), Err(FrameError::Json(_))));
        assert!(matches!(decode_record(br#"{"gear":"7"}"#), Err(FrameError::Json(_))));
        assert!(matches!(decode_record(&[0xff, 0xfe]), Err(FrameError::Utf8(_))));
        assert!(matches!(decode_record(br#"{"motor":"fast"}"#), Err(FrameError::Json(_))));
    }

    #[test]
    fn frame_error_display() {
        let err = FrameError::Overflow { limit: 1024 };
        assert!(err.to_string().contains("1024"));
    }
}
