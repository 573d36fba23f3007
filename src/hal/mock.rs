//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without a car, a wheel, or
//! a network.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPulseOutput`] | [`PulseOutput`] | Records every pulse write |
//! | [`MockInput`] | [`InputDevice`] | Scripted input samples |
//! | [`MockTicker`] | [`Ticker`] | Tick source that never waits |
//! | [`MockConnector`] | [`Connector`] | In-memory outbound streams |
//! | [`MockAcceptor`] | [`Acceptor`] | In-memory inbound streams |
//!
//! # Example
//!
//! ```rust
//! use rc_link::actuator::ActuatorController;
//! use rc_link::config::ActuatorConfig;
//! use rc_link::hal::{MockPulseOutput, PulseEvent};
//!
//! let output = MockPulseOutput::new();
//! let journal = output.journal();
//!
//! let controller = ActuatorController::new(output, ActuatorConfig::default());
//! drop(controller);
//!
//! // Dropping the controller always ends in the safe state
//! assert_eq!(
//!     journal.events(),
//!     vec![PulseEvent::Motor(1500), PulseEvent::Steering(1500), PulseEvent::Released]
//! );
//! ```
//!
//! [`PulseOutput`]: crate::traits::PulseOutput
//! [`InputDevice`]: crate::traits::InputDevice
//! [`Ticker`]: crate::traits::Ticker
//! [`Connector`]: crate::traits::Connector
//! [`Acceptor`]: crate::traits::Acceptor

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::traits::{Acceptor, Connector, InputDevice, InputSample, PulseOutput, Ticker};

/// In-memory pipe capacity for mock streams.
pub const MOCK_PIPE_CAPACITY: usize = 4096;

// ============================================================================
// Hardware Mocks
// ============================================================================

/// One write observed by a [`MockPulseOutput`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PulseEvent {
    /// Steering servo pulse (µs).
    Steering(u16),
    /// ESC pulse (µs).
    Motor(u16),
    /// Outputs released.
    Released,
}

/// Shared, cloneable view of everything a [`MockPulseOutput`] was told.
///
/// Stays readable after the output itself has been moved into (or dropped
/// with) a controller.
#[derive(Clone, Debug, Default)]
pub struct PulseJournal(Arc<Mutex<Vec<PulseEvent>>>);

impl PulseJournal {
    fn lock(&self) -> MutexGuard<'_, Vec<PulseEvent>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: PulseEvent) {
        self.lock().push(event);
    }

    /// Snapshot of all events in order.
    pub fn events(&self) -> Vec<PulseEvent> {
        self.lock().clone()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Most recent steering pulse.
    pub fn last_steering(&self) -> Option<u16> {
        self.lock().iter().rev().find_map(|e| match e {
            PulseEvent::Steering(us) => Some(*us),
            _ => None,
        })
    }

    /// Most recent motor pulse.
    pub fn last_motor(&self) -> Option<u16> {
        self.lock().iter().rev().find_map(|e| match e {
            PulseEvent::Motor(us) => Some(*us),
            _ => None,
        })
    }

    /// All motor pulses in order.
    pub fn motor_pulses(&self) -> Vec<u16> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                PulseEvent::Motor(us) => Some(*us),
                _ => None,
            })
            .collect()
    }

    /// Returns true if the outputs were released.
    pub fn released(&self) -> bool {
        self.lock().contains(&PulseEvent::Released)
    }
}

/// Mock servo/ESC output for testing.
///
/// Keeps the latest pulse on each channel in public fields and appends
/// every write to a [`PulseJournal`].
///
/// # Example
///
/// ```rust
/// use rc_link::hal::MockPulseOutput;
/// use rc_link::traits::PulseOutput;
///
/// let mut out = MockPulseOutput::new();
/// out.set_motor_pulse(1600).unwrap();
/// assert_eq!(out.motor_us, Some(1600));
///
/// out.fail_writes = true;
/// assert!(out.set_motor_pulse(1700).is_err());
/// assert_eq!(out.motor_us, Some(1600));
/// ```
#[derive(Debug, Default)]
pub struct MockPulseOutput {
    /// Last steering pulse written.
    pub steering_us: Option<u16>,
    /// Last motor pulse written.
    pub motor_us: Option<u16>,
    /// Whether `release` has been called.
    pub released: bool,
    /// Make every write fail.
    pub fail_writes: bool,
    journal: PulseJournal,
}

impl MockPulseOutput {
    /// Creates a new mock output with nothing written.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to this output's write journal.
    pub fn journal(&self) -> PulseJournal {
        self.journal.clone()
    }
}

impl PulseOutput for MockPulseOutput {
    type Error = ();

    fn set_steering_pulse(&mut self, pulse_us: u16) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.steering_us = Some(pulse_us);
        self.journal.push(PulseEvent::Steering(pulse_us));
        Ok(())
    }

    fn set_motor_pulse(&mut self, pulse_us: u16) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.motor_us = Some(pulse_us);
        self.journal.push(PulseEvent::Motor(pulse_us));
        Ok(())
    }

    fn release(&mut self) -> Result<(), ()> {
        self.released = true;
        self.journal.push(PulseEvent::Released);
        Ok(())
    }
}

/// Mock input device for testing.
///
/// Queued samples come out in FIFO order. Once the queue is empty the last
/// sample keeps being reported, like a wheel nobody is touching.
///
/// # Example
///
/// ```rust
/// use rc_link::hal::MockInput;
/// use rc_link::traits::{InputDevice, InputSample};
///
/// let mut input = MockInput::new();
/// input.queue(InputSample { gas: -1.0, ..InputSample::default() });
///
/// assert_eq!(input.sample().unwrap().gas, -1.0);
/// assert_eq!(input.sample().unwrap().gas, -1.0); // held
/// assert_eq!(input.sample_count, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockInput {
    queue: VecDeque<Result<InputSample, ()>>,
    last: InputSample,
    /// Number of times `sample` was called.
    pub sample_count: usize,
}

impl MockInput {
    /// Creates a new mock input at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one sample.
    pub fn queue(&mut self, sample: InputSample) {
        self.queue.push_back(Ok(sample));
    }

    /// Queue several samples.
    pub fn queue_many(&mut self, samples: impl IntoIterator<Item = InputSample>) {
        self.queue.extend(samples.into_iter().map(Ok));
    }

    /// Queue a failed read.
    pub fn queue_error(&mut self) {
        self.queue.push_back(Err(()));
    }

    /// Samples not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl InputDevice for MockInput {
    type Error = ();

    fn sample(&mut self) -> Result<InputSample, ()> {
        self.sample_count += 1;
        match self.queue.pop_front() {
            Some(Ok(sample)) => {
                self.last = sample;
                Ok(sample)
            }
            Some(Err(())) => Err(()),
            None => Ok(self.last),
        }
    }
}

/// Mock tick source for testing.
///
/// Never waits; each tick only yields to the runtime so other tasks can
/// make progress.
#[derive(Debug, Default)]
pub struct MockTicker {
    /// Number of ticks taken.
    pub ticks: u64,
}

impl MockTicker {
    /// Creates a new mock ticker.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ticker for MockTicker {
    async fn tick(&mut self) {
        self.ticks += 1;
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock outbound connector backed by in-memory pipes.
///
/// Each successful `connect` hands the far end of a fresh pipe to the
/// paired [`MockRemote`]. Failures can be scripted.
///
/// # Example
///
/// ```rust
/// # tokio_test_block(async {
/// use rc_link::hal::MockConnector;
/// use rc_link::traits::Connector;
///
/// let (mut connector, mut remote) = MockConnector::new();
/// connector.refuse_next(1);
///
/// assert!(connector.connect().await.is_err());
/// let _stream = connector.connect().await.unwrap();
/// assert!(remote.try_next_session().is_some());
/// assert_eq!(connector.attempts, 2);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct MockConnector {
    peers: mpsc::UnboundedSender<DuplexStream>,
    refuse: usize,
    stall: bool,
    /// Number of connect attempts made.
    pub attempts: usize,
}

/// Far side of a [`MockConnector`]: one stream per successful connect.
#[derive(Debug)]
pub struct MockRemote {
    sessions: mpsc::UnboundedReceiver<DuplexStream>,
}

impl MockConnector {
    /// Creates a connector and the remote end that receives its streams.
    pub fn new() -> (Self, MockRemote) {
        let (peers, sessions) = mpsc::unbounded_channel();
        (
            Self {
                peers,
                refuse: 0,
                stall: false,
                attempts: 0,
            },
            MockRemote { sessions },
        )
    }

    /// Refuse the next `count` connect attempts.
    pub fn refuse_next(&mut self, count: usize) {
        self.refuse = count;
    }

    /// Make connect attempts hang until cancelled.
    pub fn set_stall(&mut self, stall: bool) {
        self.stall = stall;
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn connect(&mut self) -> io::Result<DuplexStream> {
        self.attempts += 1;
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.refuse > 0 {
            self.refuse -= 1;
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        let (local, far) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
        self.peers
            .send(far)
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        Ok(local)
    }

    fn target(&self) -> String {
        "mock".into()
    }
}

impl MockRemote {
    /// Wait for the next stream the connector opens.
    pub async fn next_session(&mut self) -> Option<DuplexStream> {
        self.sessions.recv().await
    }

    /// Take an already opened stream, if any.
    pub fn try_next_session(&mut self) -> Option<DuplexStream> {
        self.sessions.try_recv().ok()
    }
}

/// Mock inbound acceptor backed by in-memory pipes.
///
/// Streams are created by the paired [`MockDialer`]. Once the dialer is
/// dropped, `accept` waits forever.
#[derive(Debug)]
pub struct MockAcceptor {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
    fail_after: Option<usize>,
    /// Number of peers accepted.
    pub accepted: usize,
    /// Number of accept calls made.
    pub attempts: usize,
}

/// Client side of a [`MockAcceptor`].
#[derive(Clone, Debug)]
pub struct MockDialer {
    outgoing: mpsc::UnboundedSender<DuplexStream>,
}

impl MockAcceptor {
    /// Creates an acceptor and the dialer that feeds it.
    pub fn new() -> (Self, MockDialer) {
        let (outgoing, incoming) = mpsc::unbounded_channel();
        (
            Self {
                incoming,
                fail_after: None,
                accepted: 0,
                attempts: 0,
            },
            MockDialer { outgoing },
        )
    }

    /// Fail every accept call once `count` peers have been accepted.
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(count);
    }
}

impl Acceptor for MockAcceptor {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, String)> {
        self.attempts += 1;
        if self.fail_after.is_some_and(|count| self.accepted >= count) {
            return Err(io::Error::other("too many open files"));
        }
        match self.incoming.recv().await {
            Some(stream) => {
                self.accepted += 1;
                Ok((stream, format!("mock-{}", self.accepted)))
            }
            None => std::future::pending().await,
        }
    }
}

impl MockDialer {
    /// Open a new connection; returns the client's end.
    pub fn dial(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
        // a dropped acceptor just leaves the client talking to nobody
        let _ = self.outgoing.send(server);
        client
    }
}

// ============================================================================
// Tests
// ============================================================================
