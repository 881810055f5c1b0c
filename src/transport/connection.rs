//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to the backing context,
//! including request/response correlation and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the backing context (responses, events)
//! - Outgoing commands from the Rust API
//! - Request/response correlation by UUID, falling back to FIFO per
//!   response name when the backing context omits the ID
//! - Event handler callbacks

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Envelope, Event, Incoming, Request, Response};

use super::correlation::CorrelationTable;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called on the event loop task for each notification received.
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a request whose completion handle is already registered.
    Send {
        request_id: RequestId,
        name: &'static str,
        frame: String,
    },
    /// Send a request nobody waits on.
    Notify(Request),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes a request's correlation entry once its caller stops waiting.
///
/// Resolved entries are already gone, so the removal only bites when the
/// caller's future is dropped or times out first.
struct PendingGuard<'a> {
    correlation: &'a Mutex<CorrelationTable>,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlation.lock().remove(self.request_id) {
            debug!(request_id = %self.request_id, "Removed abandoned correlation");
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the backing context.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the same
/// event loop.
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation table (shared with event loop).
    correlation: Arc<Mutex<CorrelationTable>>,
    /// Event handler (shared with event loop).
    event_handler: Arc<Mutex<Option<EventHandler>>>,
    /// Outstanding requests allowed at once.
    max_pending: usize,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            correlation: Arc::clone(&self.correlation),
            event_handler: Arc::clone(&self.event_handler),
            max_pending: self.max_pending,
        }
    }
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally, so this must be called from
    /// within a tokio runtime.
    pub fn new<S>(ws_stream: WebSocketStream<S>, max_pending: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationTable::new()));
        let event_handler: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&event_handler),
        ));

        Self {
            command_tx,
            correlation,
            event_handler,
            max_pending,
        }
    }

    /// Sets the event handler callback.
    ///
    /// The handler runs on the event loop task; it must not block.
    pub fn set_event_handler(&self, handler: EventHandler) {
        let mut guard = self.event_handler.lock();
        *guard = Some(handler);
    }

    /// Sends a request and waits for its response.
    ///
    /// There is no timeout: if the backing context never answers, the
    /// returned future never completes. Use [`send_with_timeout`] to bound
    /// the wait. Dropping the future withdraws the request.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    /// - [`Error::UnexpectedResponse`] if the correlated response has the
    ///   wrong name
    /// - [`Error::Protocol`] if the request expects no response or too many
    ///   requests are pending
    /// - [`Error::WebSocket`] if the request could not be written
    ///
    /// [`send_with_timeout`]: Self::send_with_timeout
    pub async fn send(&self, request: Request) -> Result<Response> {
        let (_guard, response_rx) = self.dispatch(request)?;

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Sends a request and waits for its response with a timeout.
    ///
    /// On expiry the correlation entry is removed, so a late response is
    /// dropped as unknown.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus [`Error::RequestTimeout`].
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let (guard, response_rx) = self.dispatch(request)?;
        let request_id = guard.request_id;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                drop(guard);
                Err(Error::request_timeout(request_id, request_timeout))
            }
        }
    }

    /// Sends a request without waiting for any response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn notify(&self, request: Request) -> Result<()> {
        trace!(id = %request.id, name = request.command.name(), "Queueing notification");
        self.command_tx
            .send(ConnectionCommand::Notify(request))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Completes when the event loop has stopped.
    pub async fn closed(&self) {
        self.command_tx.closed().await;
    }

    /// Shuts down the connection gracefully.
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Registers a request and queues it for the event loop.
    ///
    /// Registration and queueing happen under one lock, so the FIFO order
    /// per response name matches the order requests reach the socket, and
    /// the pending cap counts requests the event loop has not written yet.
    fn dispatch(
        &self,
        request: Request,
    ) -> Result<(PendingGuard<'_>, oneshot::Receiver<Result<Response>>)> {
        let request_id = request.id;
        let name = request.command.name();

        let Some(expected) = request.expected_response() else {
            return Err(Error::protocol(format!("{name} is never answered; use notify")));
        };

        let frame = to_string(&request)?;
        let (response_tx, response_rx) = oneshot::channel();

        let mut correlation = self.correlation.lock();
        if correlation.len() >= self.max_pending {
            warn!(
                pending = correlation.len(),
                max = self.max_pending,
                "Too many pending requests"
            );
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                correlation.len(),
                self.max_pending
            )));
        }

        // Register before sending so the response cannot overtake it
        correlation.register(request_id, expected, response_tx);

        if self
            .command_tx
            .send(ConnectionCommand::Send {
                request_id,
                name,
                frame,
            })
            .is_err()
        {
            correlation.remove(request_id);
            return Err(Error::ConnectionClosed);
        }
        drop(correlation);

        let guard = PendingGuard {
            correlation: &self.correlation,
            request_id,
        };
        Ok((guard, response_rx))
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationTable>>,
        event_handler: Arc<Mutex<Option<EventHandler>>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming messages from the backing context
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &event_handler);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request_id, name, frame }) => {
                            Self::handle_send_command(
                                request_id,
                                name,
                                frame,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Notify(request)) => {
                            Self::handle_notify_command(request, &mut ws_write).await;
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Stop accepting commands before failing what is in flight.
        command_rx.close();

        let failed = correlation.lock().fail_all(|| Error::ConnectionClosed);
        if failed > 0 {
            debug!(count = failed, "Failed pending requests on shutdown");
        }

        event_handler.lock().take();

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the backing context.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationTable>>,
        event_handler: &Arc<Mutex<Option<EventHandler>>>,
    ) {
        let envelope = match from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse incoming message");
                return;
            }
        };

        match envelope.classify() {
            Incoming::Response(response) => {
                let kind = response.kind;
                match correlation.lock().resolve(response) {
                    Ok(request_id) => trace!(%request_id, %kind, "Response delivered"),
                    Err(stray) => {
                        warn!(id = ?stray.id, name = %stray.kind, "Response for unknown request");
                    }
                }
            }

            Incoming::Event(event) => {
                let handler = event_handler.lock();
                match handler.as_ref() {
                    Some(handler) => handler(event),
                    None => trace!(name = %event.name, "Event dropped, no handler"),
                }
            }

            Incoming::Unknown(envelope) => {
                warn!(name = %envelope.name, "Unknown message name");
            }
        }
    }

    /// Handles a send command from the Rust API.
    async fn handle_send_command<S>(
        request_id: RequestId,
        name: &'static str,
        frame: String,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        correlation: &Arc<Mutex<CorrelationTable>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
            warn!(%request_id, name, error = %e, "Failed to send request");
            correlation.lock().fail(request_id, Error::WebSocket(e));
            return;
        }

        trace!(%request_id, name, "Request sent");
    }

    /// Handles a notify command from the Rust API.
    async fn handle_notify_command<S>(
        request: Request,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "Failed to serialize notification");
                return;
            }
        };

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            warn!(error = %e, name = request.command.name(), "Failed to send notification");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
