//! End-to-end tests: drive loop on one side, actuator server on the other.

use std::io;
use std::time::Duration;

use rc_link::actuator::ActuatorController;
use rc_link::config::{ActuatorConfig, Config, LinkConfig};
use rc_link::hal::{
    MockConnector, MockInput, MockPulseOutput, MockRemote, MockTicker, PulseJournal, TcpAcceptor,
    TcpConnector,
};
use rc_link::services::{ActuatorServer, DriveLoop, SessionState, TickOutcome};
use rc_link::traits::{Acceptor, InputSample};
use rc_link::transport::TransportLink;
use rc_link::{ControlCommand, Gear};
use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
use tokio::time::Instant;

/// Serves the streams a [`MockConnector`] opens, so a drive loop and a
/// server can talk in memory.
struct RemoteAcceptor(MockRemote);

impl Acceptor for RemoteAcceptor {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, String)> {
        match self.0.next_session().await {
            Some(stream) => Ok((stream, "sender".into())),
            None => std::future::pending().await,
        }
    }
}

type Drive = DriveLoop<MockInput, MockConnector, MockTicker>;

fn drive(connector: MockConnector) -> Drive {
    let config = Config::default();
    DriveLoop::new(
        MockInput::new(),
        TransportLink::new(connector, &config.link),
        MockTicker::new(),
        SessionState::from_config(&config),
    )
}

fn server<A: Acceptor>(
    acceptor: A,
    watchdog_ms: u32,
) -> (ActuatorServer<A, MockPulseOutput>, PulseJournal) {
    let output = MockPulseOutput::new();
    let journal = output.journal();
    let config = ActuatorConfig::default().with_watchdog_ms(watchdog_ms);
    (
        ActuatorServer::new(acceptor, ActuatorController::new(output, config)),
        journal,
    )
}

fn sample(steering: f32, gas: f32, shift_up: bool) -> InputSample {
    InputSample {
        steering,
        gas,
        shift_up,
        ..InputSample::default()
    }
}

fn after(ms: u64) -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_millis(ms))
}

// ============================================================================
// In-memory Link
// ============================================================================

#[tokio::test(start_paused = true)]
async fn wheel_input_reaches_the_outputs() {
    let (connector, remote) = MockConnector::new();
    let (mut server, journal) = server(RemoteAcceptor(remote), 0);
    let mut drive = drive(connector);
    drive.input_mut().queue_many([
        sample(0.0, -1.0, true),
        sample(0.0, -0.6, false),
        sample(1.0, -1.0, true),
    ]);

    let sender = async move {
        drive.start().await;
        for _ in 0..3 {
            assert!(matches!(drive.step().await, TickOutcome::Sent(_)));
        }
        after(20).await;
        assert_eq!(drive.session().gear(), Gear::Second);
    };

    let (result, ()) = tokio::join!(server.run(after(100)), sender);
    result.unwrap();

    // first, first at 0.8 gas, second; then EOF and shutdown
    assert_eq!(journal.motor_pulses(), vec![1600, 1590, 1625, 1500, 1500]);
    assert!(journal.events().contains(&rc_link::hal::PulseEvent::Steering(2400)));
    assert_eq!(journal.last_steering(), Some(1500));
    assert_eq!(server.stats().records, 3);
    assert_eq!(server.stats().sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_sender_trips_watchdog() {
    let (connector, remote) = MockConnector::new();
    let (mut server, journal) = server(RemoteAcceptor(remote), 500);
    let mut drive = drive(connector);
    drive.input_mut().queue(sample(0.0, -1.0, true));

    let sender = async move {
        drive.start().await;
        drive.step().await;
        after(700).await;
        drive.step().await;
        // keep the connection open past shutdown
        drive
    };

    let (result, _drive) = tokio::join!(server.run(after(1000)), sender);
    result.unwrap();

    assert_eq!(server.stats().watchdog_trips, 1);
    assert_eq!(server.stats().sessions, 1);
    assert_eq!(journal.motor_pulses(), vec![1600, 1500, 1600, 1500, 1500]);
}

#[tokio::test(start_paused = true)]
async fn neutral_gear_never_moves_the_motor() {
    let (connector, remote) = MockConnector::new();
    let (mut server, journal) = server(RemoteAcceptor(remote), 0);
    let mut drive = drive(connector);
    drive.input_mut().queue(sample(-1.0, -1.0, false));

    let sender = async move {
        drive.start().await;
        for _ in 0..5 {
            drive.step().await;
        }
    };

    let (result, ()) = tokio::join!(server.run(after(50)), sender);
    result.unwrap();

    assert!(journal.motor_pulses().iter().all(|&us| us == 1500));
    assert!(journal.events().contains(&rc_link::hal::PulseEvent::Steering(600)));
}

// ============================================================================
// Reconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn refused_connects_back_off() {
    let (connector, _remote) = MockConnector::new();
    let mut drive = drive(connector);
    drive.link_mut().connector_mut().refuse_next(2);

    let start = Instant::now();
    assert_eq!(drive.start().await, 3);
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(4000));
    assert!(waited < Duration::from_millis(4100));
    assert!(drive.link().is_connected());
}

#[tokio::test(start_paused = true)]
async fn receiver_restart_resumes_with_fresh_command() {
    let (connector, mut remote) = MockConnector::new();
    let mut drive = drive(connector);
    drive.start().await;

    // receiver goes away
    drop(remote.next_session().await);

    drive.input_mut().queue(sample(0.0, -1.0, true));
    match drive.step().await {
        TickOutcome::Reconnected { dropped, attempts } => {
            assert_eq!(dropped.gear, Gear::First);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected reconnect, got {other:?}"),
    }

    let second = remote.next_session().await.unwrap();
    drive.input_mut().queue(sample(0.0, -0.6, false));
    assert!(matches!(drive.step().await, TickOutcome::Sent(_)));

    let mut lines = BufReader::new(second).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    assert_eq!(
        line,
        "{\"steering\":45,\"motor\":1590,\"gear\":\"1\",\"gas\":0.8,\"brake\":0.0}"
    );
    assert_eq!(drive.link().sessions(), 2);
}

// ============================================================================
// Loopback TCP
// ============================================================================

#[tokio::test]
async fn loopback_tcp_round_trip() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let addr = acceptor.local_addr().unwrap();
    let (mut server, journal) = server(acceptor, 0);
    let watcher = journal.clone();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

    let client = async move {
        let mut link = TransportLink::new(
            TcpConnector::new(addr.to_string()),
            &LinkConfig::default(),
        );
        assert_eq!(link.reconnect().await, 1);

        let cmd = ControlCommand {
            steering_angle: 90,
            motor_pulse: 1590,
            gear: Gear::First,
            gas: 0.8,
            brake: 0.0,
        };
        link.send(&cmd).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while watcher.last_motor() != Some(1590) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        drop(link);
        let _ = done_tx.send(());
    };

    let shutdown = async {
        let _ = done_rx.await;
    };
    let (result, ()) = tokio::join!(server.run(shutdown), client);
    result.unwrap();

    assert_eq!(journal.motor_pulses()[0], 1590);
    assert_eq!(journal.last_motor(), Some(1500));
    assert_eq!(journal.last_steering(), Some(1500));
    assert!(journal.events().contains(&rc_link::hal::PulseEvent::Steering(2400)));
}
