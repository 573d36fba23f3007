//! Receiver accept-then-serve loop.
//!
//! One session is served at a time. While serving, the loop also keeps
//! accepting: a new peer supersedes the current one, whose session is
//! ended (safe state) before the new one begins.
//!
//! ```text
//!            ┌──────────── new peer ────────────┐
//!            ▼                                  │
//!  arm ─▶ accept ─▶ serve ─┬─ EOF / error ─▶ safe state ─▶ accept
//!                          ├─ watchdog ───▶ safe state (session kept)
//!                          └─ shutdown ───▶ safe state ─▶ return
//! ```
//!
//! # Example
//!
//! ```rust
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! use rc_link::actuator::ActuatorController;
//! use rc_link::config::ActuatorConfig;
//! use rc_link::hal::{MockAcceptor, MockPulseOutput};
//! use rc_link::services::ActuatorServer;
//! use tokio::io::AsyncWriteExt;
//!
//! let (acceptor, dialer) = MockAcceptor::new();
//! let output = MockPulseOutput::new();
//! let journal = output.journal();
//! let controller = ActuatorController::new(output, ActuatorConfig::default());
//! let mut server = ActuatorServer::new(acceptor, controller);
//!
//! let mut client = dialer.dial();
//! client.write_all(b"{\"steering\":45,\"motor\":1590,\"gear\":\"1\"}\n").await.unwrap();
//! drop(client);
//!
//! server
//!     .run(tokio::time::sleep(std::time::Duration::from_millis(100)))
//!     .await
//!     .unwrap();
//! assert!(journal.motor_pulses().contains(&1590));
//! assert_eq!(journal.last_motor(), Some(1500));
//! # });
//! ```

use core::fmt::Debug;
use core::future::Future;
use core::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;

use crate::actuator::ActuatorController;
use crate::traits::{Acceptor, PulseOutput};

/// Per-read buffer size.
pub const READ_CHUNK: usize = 1024;

/// Back-off after a failed accept.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// Fatal receiver errors.
///
/// Link problems are never fatal; only losing control of the outputs is.
#[derive(Error, Debug)]
pub enum ServeError<E: Debug> {
    /// Writing a pulse failed.
    #[error("actuator output failed: {0:?}")]
    Output(E),
    /// Releasing the outputs at shutdown failed.
    #[error("releasing outputs failed: {0:?}")]
    Release(E),
}

/// Counters for one server's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Sessions started.
    pub sessions: u64,
    /// Sessions ended by a newer peer.
    pub superseded: u64,
    /// Records applied.
    pub records: u64,
    /// Lines rejected as malformed.
    pub rejected: u64,
    /// Times the frame watchdog fired.
    pub watchdog_trips: u64,
}

enum SessionEnd<S> {
    Closed,
    Superseded(S, String),
    Shutdown,
}

/// Accepts peers and feeds their records to an [`ActuatorController`].
pub struct ActuatorServer<A: Acceptor, P: PulseOutput> {
    acceptor: A,
    controller: ActuatorController<P>,
    watchdog: Option<Duration>,
    arm: Duration,
    stats: ServerStats,
}

impl<A: Acceptor, P: PulseOutput> ActuatorServer<A, P> {
    /// Server using the watchdog and arming periods from the controller's
    /// configuration.
    pub fn new(acceptor: A, controller: ActuatorController<P>) -> Self {
        let config = controller.config();
        let watchdog = match config.watchdog_ms {
            0 => None,
            ms => Some(Duration::from_millis(u64::from(ms))),
        };
        let arm = Duration::from_millis(u64::from(config.arm_ms));
        Self {
            acceptor,
            controller,
            watchdog,
            arm,
            stats: ServerStats::default(),
        }
    }

    /// The controller.
    pub fn controller(&self) -> &ActuatorController<P> {
        &self.controller
    }

    /// Mutable access to the controller.
    pub fn controller_mut(&mut self) -> &mut ActuatorController<P> {
        &mut self.controller
    }

    /// The acceptor.
    pub fn acceptor(&self) -> &A {
        &self.acceptor
    }

    /// Lifetime counters.
    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Hold the safe state for the arming period so the ESC calibrates
    /// its neutral point.
    pub async fn arm(&mut self) -> Result<(), ServeError<P::Error>> {
        self.arm_until(core::future::pending::<()>()).await.map(drop)
    }

    /// [`arm`](Self::arm), cut short if `shutdown` completes first.
    ///
    /// Returns `false` when interrupted. The outputs are in the safe state
    /// either way.
    pub async fn arm_until<S>(&mut self, shutdown: S) -> Result<bool, ServeError<P::Error>>
    where
        S: Future<Output = ()>,
    {
        self.controller.safe_state().map_err(ServeError::Output)?;
        tracing::info!(hold = ?self.arm, "arming ESC");
        tokio::select! {
            _ = tokio::time::sleep(self.arm) => {
                tracing::info!("ESC armed");
                Ok(true)
            }
            _ = shutdown => {
                tracing::info!("arming interrupted");
                Ok(false)
            }
        }
    }

    /// Safe state and release the outputs once serving is over.
    ///
    /// An error already in `outcome` wins over a release failure, which
    /// is then only logged.
    pub fn release(
        &mut self,
        outcome: Result<(), ServeError<P::Error>>,
    ) -> Result<(), ServeError<P::Error>> {
        let released = self.controller.shutdown().map_err(ServeError::Release);
        match (outcome, released) {
            (Err(err), Err(release_err)) => {
                tracing::error!(error = %release_err, "outputs not released");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), released) => released,
        }
    }

    /// Accept and serve peers until `shutdown` completes.
    ///
    /// Always leaves the outputs in the safe state when it returns `Ok`.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<(), ServeError<P::Error>>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut next = None;

        loop {
            let (stream, peer) = match next.take() {
                Some(accepted) => accepted,
                None => {
                    tracing::info!("waiting for sender");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        accepted = self.acceptor.accept() => match accepted {
                            Ok(accepted) => accepted,
                            Err(err) => {
                                tracing::warn!(error = %err, "accept failed");
                                tokio::select! {
                                    _ = &mut shutdown => break,
                                    _ = tokio::time::sleep(ACCEPT_RETRY) => continue,
                                }
                            }
                        },
                    }
                }
            };

            match self.serve(stream, &peer, &mut shutdown).await? {
                SessionEnd::Closed => {}
                SessionEnd::Superseded(stream, peer) => {
                    self.stats.superseded += 1;
                    next = Some((stream, peer));
                }
                SessionEnd::Shutdown => break,
            }
        }

        tracing::info!("receiver shutting down");
        self.controller.safe_state().map_err(ServeError::Output)
    }

    async fn serve<S>(
        &mut self,
        mut stream: A::Stream,
        peer: &str,
        shutdown: &mut Pin<&mut S>,
    ) -> Result<SessionEnd<A::Stream>, ServeError<P::Error>>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(peer, "sender connected");
        self.stats.sessions += 1;
        self.controller.begin_session();

        let mut buf = [0u8; READ_CHUNK];
        let watchdog = self.watchdog;
        let mut deadline = watchdog.map(|period| Instant::now() + period);
        let mut accept_retry: Option<Instant> = None;

        let end = loop {
            let expiry = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => core::future::pending().await,
                }
            };
            let retry = async move {
                if let Some(at) = accept_retry {
                    tokio::time::sleep_until(at).await;
                }
            };

            tokio::select! {
                _ = shutdown.as_mut() => break SessionEnd::Shutdown,

                accepted = self.acceptor.accept(), if accept_retry.is_none() => match accepted {
                    Ok((next, next_peer)) => {
                        tracing::info!(peer, by = %next_peer, "session superseded");
                        break SessionEnd::Superseded(next, next_peer);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        accept_retry = Some(Instant::now() + ACCEPT_RETRY);
                    }
                },

                _ = retry, if accept_retry.is_some() => accept_retry = None,

                _ = expiry => {
                    tracing::warn!(peer, period = ?watchdog, "no record received, safe state");
                    self.stats.watchdog_trips += 1;
                    self.controller.safe_state().map_err(ServeError::Output)?;
                    deadline = None;
                }

                read = stream.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::info!(peer, "sender disconnected");
                        break SessionEnd::Closed;
                    }
                    Ok(n) => {
                        let report = self.controller.feed(&buf[..n]).map_err(ServeError::Output)?;
                        self.stats.records += report.applied as u64;
                        self.stats.rejected += report.rejected as u64;
                        if report.applied > 0 {
                            deadline = watchdog.map(|period| Instant::now() + period);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(peer, error = %err, "read failed");
                        break SessionEnd::Closed;
                    }
                },
            }
        };

        self.controller.end_session().map_err(ServeError::Output)?;
        Ok(end)
    }
}
