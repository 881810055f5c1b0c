//! Request/response bridge to the backing record store.
//!
//! A [`Bridge`] owns one connection to the backing context plus the state
//! fed by its notifications.
//!
//! # Example
//!
//! ```ignore
//! use autofill_bridge::{AddressField, Bridge, BridgeConfig, ChangeType, Record};
//!
//! let pending = Bridge::listen(BridgeConfig::default()).await?;
//! println!("store should connect to {}", pending.ws_url());
//! let bridge = pending.accept().await?;
//!
//! let mut changes = bridge.storage_changes();
//! bridge
//!     .add_record(&Record::new().with(AddressField::GivenName, "John"))
//!     .await?;
//! changes.expect(ChangeType::Add).await?;
//!
//! bridge.close()?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Notification state and subscriptions.
pub mod events;

/// Record operations.
mod records;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::protocol::{Command, Request, Response};
use crate::transport::{self, Connection, PendingServer};

use self::events::{EventState, StorageChanges};

// ============================================================================
// PendingBridge
// ============================================================================

/// A bridge whose server is bound but whose backing context has not yet
/// connected.
pub struct PendingBridge {
    server: PendingServer,
    config: BridgeConfig,
}

impl PendingBridge {
    /// URL the backing context should connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        self.server.ws_url()
    }

    /// Port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.server.port()
    }

    /// Waits for the backing context to connect.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nothing connects within
    ///   `connect_timeout`
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    pub async fn accept(self) -> Result<Bridge> {
        let connection = self
            .server
            .accept(self.config.connect_timeout, self.config.max_pending)
            .await?;
        Ok(Bridge::new(connection, &self.config))
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Connection to the backing record store.
///
/// Every storage operation sends one request and resolves when its single
/// matching response arrives.
pub struct Bridge {
    connection: Connection,
    request_timeout: Option<Duration>,
    events: EventState,
}

impl Bridge {
    /// Binds a server for the backing context to connect to.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Io`] if binding fails
    pub async fn listen(config: BridgeConfig) -> Result<PendingBridge> {
        config.validate()?;
        let server = PendingServer::bind(config.bind_ip, config.port).await?;
        Ok(PendingBridge { server, config })
    }

    /// Connects to a backing context listening at `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration or URL scheme is invalid
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Connection`] if the handshake fails
    pub async fn connect(url: &str, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let connection = transport::connect(url, config.max_pending).await?;
        Ok(Self::new(connection, &config))
    }

    /// Wraps an established WebSocket stream.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, config: BridgeConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;
        let connection = Connection::new(ws_stream, config.max_pending);
        Ok(Self::new(connection, &config))
    }

    fn new(connection: Connection, config: &BridgeConfig) -> Self {
        let events = EventState::new(config.event_capacity);
        connection.set_event_handler(events.handler());

        debug!(
            request_timeout = ?config.request_timeout,
            max_pending = config.max_pending,
            "Bridge ready"
        );

        Self {
            connection,
            request_timeout: config.request_timeout,
            events,
        }
    }

    /// Sends a command and waits for its response.
    ///
    /// Applies the configured request timeout, if any.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`] and [`Connection::send_with_timeout`].
    pub async fn send(&self, command: Command) -> Result<Response> {
        let request = Request::new(command);
        match self.request_timeout {
            Some(request_timeout) => {
                self.connection
                    .send_with_timeout(request, request_timeout)
                    .await
            }
            None => self.connection.send(request).await,
        }
    }

    /// Sends a command with an explicit timeout, overriding the configured one.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_with_timeout`].
    pub async fn send_with_timeout(
        &self,
        command: Command,
        request_timeout: Duration,
    ) -> Result<Response> {
        self.connection
            .send_with_timeout(Request::new(command), request_timeout)
            .await
    }

    /// Subscribes to storage-changed notifications.
    #[must_use]
    pub fn storage_changes(&self) -> StorageChanges {
        self.events.subscribe(self.connection.clone())
    }

    /// Results of the most recent popup, if one has been shown.
    #[must_use]
    pub fn last_popup_results(&self) -> Option<Vec<Value>> {
        self.events.last_popup_results()
    }

    /// Waits for the next popup and returns its results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection closes first.
    pub async fn wait_for_popup(&self) -> Result<Vec<Value>> {
        let mut receiver = self.events.popup_receiver();
        tokio::select! {
            changed = receiver.changed() => {
                changed.map_err(|_| Error::ConnectionClosed)?;
                Ok(receiver.borrow_and_update().clone().unwrap_or_default())
            }
            () = self.connection.closed() => Err(Error::ConnectionClosed),
        }
    }

    /// Number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.connection.pending_count()
    }

    /// Returns `true` once the connection has closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Asks the backing context to clean up, then closes the connection.
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection was already
    /// closed.
    pub fn close(&self) -> Result<()> {
        debug!(pending = self.pending_count(), "Closing bridge");
        let sent = self.connection.notify(Request::new(Command::Cleanup));
        self.connection.shutdown();
        sent
    }
}

// ============================================================================
// Tests
// ============================================================================
