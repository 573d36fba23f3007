//! TCP implementations of the network traits, plus the real-time ticker.
//!
//! # Example
//!
//! ```rust,no_run
//! use rc_link::config::LinkConfig;
//! use rc_link::hal::{TcpAcceptor, TcpConnector};
//!
//! # async fn run() -> std::io::Result<()> {
//! let link = LinkConfig::default();
//! let acceptor = TcpAcceptor::bind(&link.bind_address()).await?;
//! let connector = TcpConnector::from_config(&link);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::LinkConfig;
use crate::traits::{Acceptor, Connector, Ticker};

/// Outbound TCP connector.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    address: String,
    nodelay: bool,
}

impl TcpConnector {
    /// Connector for `host:port`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nodelay: true,
        }
    }

    /// Connector for the configured receiver address.
    pub fn from_config(link: &LinkConfig) -> Self {
        Self::new(link.target_address()).with_nodelay(link.nodelay)
    }

    /// Enable or disable TCP_NODELAY on new streams.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.address.as_str()).await?;
        stream.set_nodelay(self.nodelay)?;
        Ok(stream)
    }

    fn target(&self) -> String {
        self.address.clone()
    }
}

/// Inbound TCP acceptor.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind a listener on `address`.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(address).await?,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Acceptor for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((stream, peer.to_string()))
    }
}

/// Fixed-period ticker on the tokio clock.
///
/// A late tick delays the schedule rather than bursting to catch up.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Ticker firing every `period_ms` milliseconds (minimum 1).
    pub fn new(period_ms: u32) -> Self {
        let mut interval = tokio::time::interval(Duration::from_millis(u64::from(period_ms.max(1))));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn tcp_roundtrip_on_loopback() {
        let mut acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap();
        let mut connector = TcpConnector::new(addr.to_string());

        let mut client = connector.connect().await.unwrap();
        assert!(client.nodelay().unwrap());
        let (mut server, peer) = acceptor.accept().await.unwrap();
        assert!(peer.starts_with("127.0.0.1:"));

        client.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
    }

    #[tokio::test]
    async fn tcp_connect_refused() {
        // bind then drop to get a port nobody listens on
        let addr = {
            let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
            acceptor.local_addr().unwrap()
        };
        let mut connector = TcpConnector::new(addr.to_string());
        assert!(connector.connect().await.is_err());
        assert_eq!(connector.target(), addr.to_string());
    }

    #[test]
    fn connector_from_config() {
        let link = LinkConfig::default().with_host("car.local").with_port(6000).with_nodelay(false);
        let connector = TcpConnector::from_config(&link);
        assert_eq!(connector.target(), "car.local:6000");
        assert!(!connector.nodelay);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_period() {
        let mut ticker = IntervalTicker::new(10);
        let start = tokio::time::Instant::now();
        ticker.tick().await; // first tick is immediate
        ticker.tick().await;
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }
}
