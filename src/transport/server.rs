//! WebSocket server the backing context connects to.
//!
//! # Connection Flow
//!
//! 1. Rust binds a WebSocket server to `localhost:0` (random port)
//! 2. The backing context is started with the server's `ws://` URL
//! 3. The backing context connects
//! 4. Connection established, ready for requests

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;

// ============================================================================
// PendingServer
// ============================================================================

/// A WebSocket server that is bound but not yet connected.
///
/// Represents the state between binding to a port and accepting
/// the backing context's connection.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use std::time::Duration;
/// use autofill_bridge::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = server.ws_url();
///
/// // Start the backing context with ws_url...
///
/// let connection = server.accept(Duration::from_secs(30), 100).await?;
/// ```
pub struct PendingServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the server is bound to.
    addr: SocketAddr,
}

impl PendingServer {
    /// Binds a WebSocket server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(port = addr.port(), "WebSocket server bound");

        Ok(Self { listener, addr })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts a connection from the backing context.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nothing connects within `connect_timeout`
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    pub async fn accept(self, connect_timeout: Duration, max_pending: usize) -> Result<Connection> {
        let (stream, peer) = timeout(connect_timeout, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout))??;

        debug!(?peer, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.addr.port(), "WebSocket connection established");

        Ok(Connection::new(ws_stream, max_pending))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use crate::protocol::{Command, Request, ResponseKind};
    use crate::testing::run_mock_store;

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(server.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://127.0.0.1:{}", server.port()));
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_accept_times_out() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        let result = server.accept(Duration::from_millis(20), 10).await;
        assert!(matches!(result, Err(Error::ConnectionTimeout { timeout_ms: 20 })));
    }

    #[tokio::test]
    async fn test_accept_and_round_trip() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");
        let url = server.ws_url();

        let store = tokio::spawn(async move {
            let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .expect("connect");
            run_mock_store(ws, Default::default()).await
        });

        let connection = server
            .accept(Duration::from_secs(5), 10)
            .await
            .expect("accept");
        let response = connection
            .send(Request::new(Command::GetAllRecords))
            .await
            .expect("response");
        assert_eq!(response.kind, ResponseKind::AllRecords);

        connection.shutdown();
        let received = store.await.expect("join");
        assert_eq!(received, vec!["FormAutofillTest:GetAddresses".to_string()]);
    }
}
