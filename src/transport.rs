//! Sender side of the link: one persistent stream with reconnect.
//!
//! [`TransportLink`] is an explicit two-state machine:
//!
//! ```text
//!               connect ok
//!  Disconnected ───────────▶ Connected
//!       ▲                        │
//!       └──── write error ───────┘
//!             write timeout
//! ```
//!
//! A failed [`send`](TransportLink::send) drops the stream and returns the
//! error; nothing is queued. The caller decides when to
//! [`reconnect`](TransportLink::reconnect), which retries a fresh connect
//! after a fixed backoff, forever. There is no exponential backoff and no
//! attempt cap: the operator is sitting right there.
//!
//! # Example
//!
//! ```rust
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! use rc_link::config::LinkConfig;
//! use rc_link::hal::MockConnector;
//! use rc_link::transport::{LinkState, TransportLink};
//! use rc_link::ControlCommand;
//!
//! let (connector, _remote) = MockConnector::new();
//! let mut link = TransportLink::new(connector, &LinkConfig::default());
//! assert_eq!(link.state(), LinkState::Disconnected);
//!
//! link.reconnect().await;
//! link.send(&ControlCommand::idle(1500)).await.unwrap();
//! assert_eq!(link.records_sent(), 1);
//! # });
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::commands::ControlCommand;
use crate::config::LinkConfig;
use crate::messages::encode_record;
use crate::traits::Connector;

/// Link errors; all of them are transient.
#[derive(Error, Debug)]
pub enum LinkError {
    /// No stream is open.
    #[error("link is not connected")]
    Disconnected,

    /// The connect attempt failed.
    #[error("connect to {target} failed: {source}")]
    Connect {
        /// Address that was dialled.
        target: String,
        /// Underlying error.
        source: io::Error,
    },

    /// The connect attempt did not finish in time.
    #[error("connect to {target} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Address that was dialled.
        target: String,
        /// Configured bound.
        timeout: Duration,
    },

    /// Writing the record failed.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// Writing the record did not finish in time.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// The command could not be serialized.
    #[error("cannot encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connection state of a [`TransportLink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// No stream; sends fail until reconnected.
    Disconnected,
    /// A stream is open.
    Connected,
}

/// Time bounds for link operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkTimings {
    /// Wait between failed connect attempts.
    pub backoff: Duration,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Bound on writing a single record.
    pub write_timeout: Duration,
}

impl From<&LinkConfig> for LinkTimings {
    fn from(link: &LinkConfig) -> Self {
        Self {
            backoff: Duration::from_millis(u64::from(link.reconnect_backoff_ms)),
            connect_timeout: Duration::from_millis(u64::from(link.connect_timeout_ms)),
            write_timeout: Duration::from_millis(u64::from(link.write_timeout_ms)),
        }
    }
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self::from(&LinkConfig::default())
    }
}

/// Persistent outbound link over a [`Connector`].
pub struct TransportLink<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    timings: LinkTimings,
    records_sent: u64,
    sessions: u64,
}

impl<C: Connector> TransportLink<C> {
    /// Link using timings from `link`. Starts disconnected.
    pub fn new(connector: C, link: &LinkConfig) -> Self {
        Self::with_timings(connector, LinkTimings::from(link))
    }

    /// Link with explicit timings. Starts disconnected.
    pub fn with_timings(connector: C, timings: LinkTimings) -> Self {
        Self {
            connector,
            stream: None,
            timings,
            records_sent: 0,
            sessions: 0,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        if self.stream.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    /// Returns true if a stream is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The connector in use.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Mutable access to the connector.
    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    /// Timing bounds in use.
    pub fn timings(&self) -> LinkTimings {
        self.timings
    }

    /// Records written successfully over the lifetime of the link.
    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    /// Streams opened over the lifetime of the link.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Drop the current stream, if any.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("link stream dropped");
        }
    }

    /// One connect attempt, bounded by the connect timeout.
    ///
    /// Any existing stream is dropped first.
    pub async fn connect_once(&mut self) -> Result<(), LinkError> {
        self.disconnect();
        let timeout = self.timings.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect()).await {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                self.sessions += 1;
                tracing::info!(addr = %self.connector.target(), "connected");
                Ok(())
            }
            Ok(Err(source)) => Err(LinkError::Connect {
                target: self.connector.target(),
                source,
            }),
            Err(_) => Err(LinkError::ConnectTimeout {
                target: self.connector.target(),
                timeout,
            }),
        }
    }

    /// Retry [`connect_once`](Self::connect_once) until it succeeds,
    /// waiting the backoff between failures.
    ///
    /// Returns the number of attempts made.
    pub async fn reconnect(&mut self) -> u32 {
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            match self.connect_once().await {
                Ok(()) => return attempts,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        attempt = attempts,
                        "reconnecting in {:?}",
                        self.timings.backoff
                    );
                    tokio::time::sleep(self.timings.backoff).await;
                }
            }
        }
    }

    /// Write one command as a single record.
    ///
    /// On any failure the stream is dropped and the link becomes
    /// [`LinkState::Disconnected`].
    pub async fn send(&mut self, cmd: &ControlCommand) -> Result<(), LinkError> {
        let line = encode_record(cmd)?;
        let timeout = self.timings.write_timeout;
        let stream = self.stream.as_mut().ok_or(LinkError::Disconnected)?;

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        };
        let outcome = match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(LinkError::Send(err)),
            Err(_) => Err(LinkError::SendTimeout(timeout)),
        };

        match outcome {
            Ok(()) => {
                self.records_sent += 1;
                Ok(())
            }
            Err(err) => {
                self.stream = None;
                Err(err)
            }
        }
    }
}
