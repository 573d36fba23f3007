//! Receiver side: records in, bounded pulses out.
//!
//! [`ActuatorController`] owns the pulse outputs and the receive buffer of
//! the current session. It is the only writer of the outputs.
//!
//! # Mapping
//!
//! | Input | Output |
//! |-------|--------|
//! | `steering` (`0..=90`, clamped) | linear into `[steering_min_us, steering_max_us]` |
//! | `gear == "N"` | motor forced to neutral, whatever `motor` says |
//! | any other gear | `motor` clamped to `[motor_min_us, motor_max_us]` |
//!
//! The sender is never trusted: every value is re-clamped here.
//!
//! # Safe state
//!
//! ESC at neutral, servo centred. Commanded at session end, on shutdown,
//! and from `Drop`, so every exit path (including error returns and
//! unwinding panics) leaves the car stopped.
//!
//! # Example
//!
//! ```rust
//! use rc_link::actuator::ActuatorController;
//! use rc_link::config::ActuatorConfig;
//! use rc_link::hal::MockPulseOutput;
//!
//! let mut controller = ActuatorController::new(MockPulseOutput::new(), ActuatorConfig::default());
//!
//! // A record split across two reads
//! controller.feed(br#"{"steering":90,"motor":1590,"#).unwrap();
//! let report = controller.feed(b"\"gear\":\"1\"}\n").unwrap();
//! assert_eq!(report.applied, 1);
//! assert_eq!(controller.output().steering_us, Some(2400));
//! assert_eq!(controller.output().motor_us, Some(1590));
//!
//! // Link lost
//! controller.end_session().unwrap();
//! assert_eq!(controller.output().motor_us, Some(1500));
//! ```

use crate::axis::{STEERING_CENTER, STEERING_RANGE};
use crate::config::ActuatorConfig;
use crate::framing::LineFramer;
use crate::gear::Gear;
use crate::messages::{decode_record, WireRecord};
use crate::traits::PulseOutput;

/// Pulse widths written for one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputPulses {
    /// Servo pulse (µs).
    pub steering_us: u16,
    /// ESC pulse (µs).
    pub motor_us: u16,
}

/// Outcome of feeding one read into the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Records decoded and applied.
    pub applied: usize,
    /// Lines dropped as malformed or oversized.
    pub rejected: usize,
}

/// Decodes records and drives the servo and ESC.
pub struct ActuatorController<P: PulseOutput> {
    output: P,
    config: ActuatorConfig,
    framer: LineFramer,
    last: Option<OutputPulses>,
    released: bool,
}

impl<P: PulseOutput> ActuatorController<P> {
    /// Controller for `output`. Nothing is written until the first call.
    pub fn new(output: P, config: ActuatorConfig) -> Self {
        Self {
            output,
            config,
            framer: LineFramer::new(),
            last: None,
            released: false,
        }
    }

    /// Pulse configuration in use.
    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// The underlying output.
    pub fn output(&self) -> &P {
        &self.output
    }

    /// Pulses most recently written, if any.
    pub fn last_pulses(&self) -> Option<OutputPulses> {
        self.last
    }

    /// Bytes of an incomplete record waiting for the rest of its line.
    pub fn pending_bytes(&self) -> usize {
        self.framer.pending()
    }

    /// The safe-state pulses for this configuration.
    pub fn safe_pulses(&self) -> OutputPulses {
        OutputPulses {
            steering_us: self.config.steering_center_us(),
            motor_us: self.config.motor_neutral_us,
        }
    }

    /// Map a record to pulses without writing anything.
    pub fn map(&self, record: &WireRecord) -> OutputPulses {
        let cfg = &self.config;

        let angle = record
            .steering
            .unwrap_or(i64::from(STEERING_CENTER))
            .clamp(0, i64::from(STEERING_RANGE));
        let span = f64::from(cfg.steering_max_us) - f64::from(cfg.steering_min_us);
        let steering = f64::from(cfg.steering_min_us) + span * angle as f64 / f64::from(STEERING_RANGE);

        let motor_us = if record.gear == Gear::Neutral {
            cfg.motor_neutral_us
        } else {
            let motor = record
                .motor
                .unwrap_or(i64::from(cfg.motor_neutral_us))
                .clamp(i64::from(cfg.motor_min_us), i64::from(cfg.motor_max_us));
            u16::try_from(motor).unwrap_or(cfg.motor_neutral_us)
        };

        OutputPulses {
            steering_us: steering.round() as u16,
            motor_us,
        }
    }

    /// Map and write one record.
    pub fn apply(&mut self, record: &WireRecord) -> Result<OutputPulses, P::Error> {
        let pulses = self.map(record);
        self.write(pulses)?;
        tracing::trace!(
            gear = %record.gear,
            gas = record.gas,
            brake = record.brake,
            steering_us = pulses.steering_us,
            motor_us = pulses.motor_us,
            "applied"
        );
        Ok(pulses)
    }

    /// Append bytes from the stream and apply every complete record.
    ///
    /// Malformed lines are logged and skipped; only an output failure is
    /// an error.
    pub fn feed(&mut self, data: &[u8]) -> Result<FeedReport, P::Error> {
        let mut records = Vec::new();
        let mut report = FeedReport::default();

        self.framer.feed(data, |line| match line.and_then(decode_record) {
            Ok(record) => records.push(record),
            Err(err) => {
                report.rejected += 1;
                tracing::warn!(error = %err, "dropping record");
            }
        });

        for record in &records {
            self.apply(record)?;
            report.applied += 1;
        }
        Ok(report)
    }

    /// Start a new session: forget any partial record from the last one.
    pub fn begin_session(&mut self) {
        self.framer.clear();
    }

    /// End the current session and command the safe state.
    pub fn end_session(&mut self) -> Result<(), P::Error> {
        self.framer.clear();
        self.safe_state()
    }

    /// ESC to neutral, then servo to centre.
    pub fn safe_state(&mut self) -> Result<(), P::Error> {
        let safe = self.safe_pulses();
        self.output.set_motor_pulse(safe.motor_us)?;
        self.output.set_steering_pulse(safe.steering_us)?;
        self.last = Some(safe);
        tracing::debug!("safe state");
        Ok(())
    }

    /// Safe state, then release the outputs. `Drop` becomes a no-op.
    pub fn shutdown(&mut self) -> Result<(), P::Error> {
        if self.released {
            return Ok(());
        }
        let safe = self.safe_state();
        let release = self.output.release();
        self.released = true;
        safe.and(release)
    }

    fn write(&mut self, pulses: OutputPulses) -> Result<(), P::Error> {
        self.output.set_steering_pulse(pulses.steering_us)?;
        self.output.set_motor_pulse(pulses.motor_us)?;
        self.last = Some(pulses);
        Ok(())
    }
}

impl<P: PulseOutput> Drop for ActuatorController<P> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = ?err, "failed to reach safe state on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockPulseOutput, PulseEvent};

    fn controller() -> ActuatorController<MockPulseOutput> {
        ActuatorController::new(MockPulseOutput::new(), ActuatorConfig::default())
    }

    fn record(steering: i64, motor: i64, gear: Gear) -> WireRecord {
        WireRecord {
            steering: Some(steering),
            motor: Some(motor),
            gear,
            ..WireRecord::default()
        }
    }

    // =========================================================================
    // Mapping Tests
    // =========================================================================

    #[test]
    fn steering_maps_linearly() {
        let c = controller();
        assert_eq!(c.map(&record(0, 1500, Gear::First)).steering_us, 600);
        assert_eq!(c.map(&record(45, 1500, Gear::First)).steering_us, 1500);
        assert_eq!(c.map(&record(90, 1500, Gear::First)).steering_us, 2400);
        assert_eq!(c.map(&record(30, 1500, Gear::First)).steering_us, 1200);
    }

    #[test]
    fn steering_out_of_range_clamped() {
        let c = controller();
        assert_eq!(c.map(&record(-50, 1500, Gear::First)).steering_us, 600);
        assert_eq!(c.map(&record(400, 1500, Gear::First)).steering_us, 2400);
    }

    #[test]
    fn neutral_gear_forces_neutral_motor() {
        let c = controller();
        assert_eq!(c.map(&record(45, 2000, Gear::Neutral)).motor_us, 1500);
        assert_eq!(c.map(&record(45, 1000, Gear::Neutral)).motor_us, 1500);
    }

    #[test]
    fn motor_clamped_in_drive_gears() {
        let c = controller();
        assert_eq!(c.map(&record(45, 99_999, Gear::Fifth)).motor_us, 2000);
        assert_eq!(c.map(&record(45, -5, Gear::Reverse)).motor_us, 1000);
        assert_eq!(c.map(&record(45, 1460, Gear::Reverse)).motor_us, 1460);
        assert_eq!(c.map(&record(45, 1590, Gear::First)).motor_us, 1590);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let c = controller();
        let pulses = c.map(&WireRecord {
            gear: Gear::Second,
            ..WireRecord::default()
        });
        assert_eq!(pulses, c.safe_pulses());
    }

    #[test]
    fn custom_ranges() {
        let config = ActuatorConfig::default()
            .with_steering_range(1000, 2000)
            .with_motor_range(1100, 1520, 1900);
        let c = ActuatorController::new(MockPulseOutput::new(), config);
        assert_eq!(c.map(&record(90, 1500, Gear::Neutral)), OutputPulses {
            steering_us: 2000,
            motor_us: 1520,
        });
        assert_eq!(c.map(&record(0, 2000, Gear::Third)).motor_us, 1900);
    }

    // =========================================================================
    // Feed Tests
    // =========================================================================

    #[test]
    fn feed_applies_each_complete_record() {
        let mut c = controller();
        let report = c
            .feed(b"{\"steering\":0,\"motor\":1600,\"gear\":\"2\"}\n{\"steering\":90,\"motor\":1650,\"gear\":\"3\"}\n")
            .unwrap();
        assert_eq!(report, FeedReport { applied: 2, rejected: 0 });
        assert_eq!(c.output().motor_us, Some(1650));
        assert_eq!(c.output().journal().motor_pulses(), vec![1600, 1650]);
    }

    #[test]
    fn feed_skips_malformed_and_continues() {
        let mut c = controller();
        let report = c
            .feed(b"garbage\n{\"motor\":1700,\"gear\":\"4\"}\n{\"gear\":\"9\"}\n")
            .unwrap();
        assert_eq!(report, FeedReport { applied: 1, rejected: 2 });
        assert_eq!(c.output().motor_us, Some(1700));
    }

    #[test]
    fn feed_keeps_partial_record() {
        let mut c = controller();
        let report = c.feed(b"{\"motor\":1700,").unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(c.pending_bytes(), 14);
        assert!(c.output().journal().is_empty());
    }

    #[test]
    fn output_failure_is_reported() {
        let mut out = MockPulseOutput::new();
        out.fail_writes = true;
        let mut c = ActuatorController::new(out, ActuatorConfig::default());
        assert!(c.feed(b"{\"gear\":\"1\"}\n").is_err());
    }

    // =========================================================================
    // Safe State Tests
    // =========================================================================

    #[test]
    fn end_session_commands_safe_state_and_clears_buffer() {
        let mut c = controller();
        c.feed(b"{\"steering\":90,\"motor\":1800,\"gear\":\"5\"}\n{\"stee").unwrap();
        c.end_session().unwrap();
        assert_eq!(c.pending_bytes(), 0);
        assert_eq!(c.output().motor_us, Some(1500));
        assert_eq!(c.output().steering_us, Some(1500));
        assert_eq!(c.last_pulses(), Some(c.safe_pulses()));
    }

    #[test]
    fn safe_state_cuts_motor_first() {
        let mut c = controller();
        let journal = c.output().journal();
        c.safe_state().unwrap();
        assert_eq!(journal.events(), vec![PulseEvent::Motor(1500), PulseEvent::Steering(1500)]);
    }

    #[test]
    fn drop_reaches_safe_state_then_releases() {
        let mut c = controller();
        let journal = c.output().journal();
        c.feed(b"{\"motor\":1800,\"gear\":\"5\"}\n").unwrap();
        drop(c);
        let events = journal.events();
        assert_eq!(
            &events[events.len() - 3..],
            &[PulseEvent::Motor(1500), PulseEvent::Steering(1500), PulseEvent::Released]
        );
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut c = controller();
        let journal = c.output().journal();
        c.shutdown().unwrap();
        c.shutdown().unwrap();
        drop(c);
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn drop_during_panic_still_safe() {
        let journal = {
            let c = controller();
            c.output().journal()
        };
        assert!(journal.released());

        let out = MockPulseOutput::new();
        let journal = out.journal();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut c = ActuatorController::new(out, ActuatorConfig::default());
            c.feed(b"{\"motor\":1900,\"gear\":\"5\"}\n").unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(journal.last_motor(), Some(1500));
        assert!(journal.released());
    }
}
