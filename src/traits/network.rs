//! Network abstraction traits for the control link.
//!
//! The link is a single long-lived byte stream from the operator station
//! to the vehicle. These traits separate *how a stream is obtained* from
//! *what is done with it*, so the drive loop and the actuator server can
//! be tested over in-memory pipes.
//!
//! # Traits
//!
//! | Trait | Side | Purpose |
//! |-------|------|---------|
//! | [`Connector`] | sender | Open an outbound stream to the vehicle |
//! | [`Acceptor`] | receiver | Wait for the next inbound stream |
//!
//! # Protocol
//!
//! ```text
//! sender ── {"steering":45,"motor":1500,"gear":"N","gas":0.0,"brake":0.0}\n ──▶ receiver
//! ```
//!
//! One JSON record per line, see [`crate::messages`]. There is no
//! handshake and no acknowledgement.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// Outbound stream factory (sender side).
///
/// # Implementation Notes
///
/// - `connect` may take as long as it likes; the caller bounds it with
///   its own timeout
/// - Each call should produce a fresh stream; the caller drops the old one
///   on any write failure
///
/// # Example
///
/// ```rust,ignore
/// use rc_link::traits::Connector;
/// use tokio::net::TcpStream;
///
/// struct Plain(String);
///
/// impl Connector for Plain {
///     type Stream = TcpStream;
///
///     async fn connect(&mut self) -> std::io::Result<TcpStream> {
///         TcpStream::connect(self.0.as_str()).await
///     }
/// }
/// ```
pub trait Connector {
    /// Stream type produced by a successful connect.
    type Stream: AsyncWrite + Unpin;

    /// Open a new stream to the receiver.
    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Stream>>;

    /// Human-readable target, for logs.
    fn target(&self) -> String;
}

/// Inbound stream source (receiver side).
///
/// # Implementation Notes
///
/// - `accept` waits until a peer connects
/// - The returned label identifies the peer in logs
/// - Returning an error does not stop the server; it logs and retries
pub trait Acceptor {
    /// Stream type produced for each accepted peer.
    type Stream: AsyncRead + Unpin;

    /// Wait for the next peer.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, String)>>;
}
