//! In-process backing store for tests.
//!
//! Speaks the wire protocol over any WebSocket stream. Requests for
//! unknown guids are never answered, like a store that silently ignores
//! them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Once;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing_subscriber::EnvFilter;

use crate::config::BridgeConfig;
use crate::identifiers::RecordId;
use crate::protocol::Record;
use crate::transport::Connection;
use crate::Bridge;

// ============================================================================
// Options
// ============================================================================

/// Mock store behavior.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MockOptions {
    /// Echo request IDs on responses.
    pub echo_ids: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self { echo_ids: true }
    }
}

// ============================================================================
// MockHandle
// ============================================================================

/// Handle to a running mock store.
pub(crate) struct MockHandle {
    inject_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<Vec<String>>,
}

impl MockHandle {
    /// Pushes an arbitrary JSON frame to the bridge.
    pub fn inject(&self, frame: Value) {
        self.inject_raw(&frame.to_string());
    }

    /// Pushes an arbitrary text frame to the bridge.
    pub fn inject_raw(&self, text: &str) {
        let _ = self.inject_tx.send(text.to_string());
    }

    /// Waits for the store to see the socket close and returns the names of
    /// every message it received.
    pub async fn finish(self) -> Vec<String> {
        drop(self.inject_tx);
        self.task.await.unwrap_or_default()
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Installs a test subscriber once; honors `RUST_LOG`.
pub(crate) fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("autofill_bridge=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Creates a connected client/server WebSocket pair over an in-memory pipe.
pub(crate) async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
    (client, server)
}

/// Spawns a mock store and returns a [`Connection`] to it.
pub(crate) async fn spawn_mock_connection(
    options: MockOptions,
    max_pending: usize,
) -> (Connection, MockHandle) {
    init_logging();
    let (client, server) = ws_pair().await;
    let handle = spawn_mock_store(server, options);
    (Connection::new(client, max_pending), handle)
}

/// Spawns a mock store and returns a [`Bridge`] to it.
pub(crate) async fn spawn_mock_bridge(
    options: MockOptions,
    config: BridgeConfig,
) -> (Bridge, MockHandle) {
    init_logging();
    let (client, server) = ws_pair().await;
    let handle = spawn_mock_store(server, options);
    let bridge = Bridge::from_stream(client, config).expect("valid config");
    (bridge, handle)
}

/// Spawns a mock store task on `ws`.
pub(crate) fn spawn_mock_store<S>(ws: WebSocketStream<S>, options: MockOptions) -> MockHandle
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (inject_tx, inject_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(serve(ws, options, inject_rx));
    MockHandle { inject_tx, task }
}

/// Runs a mock store on `ws` until the socket closes.
pub(crate) async fn run_mock_store<S>(ws: WebSocketStream<S>, options: MockOptions) -> Vec<String>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (_inject_tx, inject_rx) = mpsc::unbounded_channel();
    serve(ws, options, inject_rx).await
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
struct Store {
    records: Vec<Record>,
    next_guid: usize,
}

async fn serve<S>(
    ws: WebSocketStream<S>,
    options: MockOptions,
    mut inject_rx: mpsc::UnboundedReceiver<String>,
) -> Vec<String>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws.split();
    let mut store = Store::default();
    let mut received = Vec::new();

    loop {
        tokio::select! {
            biased;

            Some(text) = inject_rx.recv() => {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let Ok(message) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let name = message["name"].as_str().unwrap_or_default().to_string();
                received.push(name.clone());

                for reply in store.handle(&name, &message, options) {
                    if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return received;
                    }
                }
            }
        }
    }

    received
}

impl Store {
    /// Applies a request and returns the frames to send back.
    fn handle(&mut self, name: &str, message: &Value, options: MockOptions) -> Vec<Value> {
        let data = &message["data"];
        let reply = |response: &str, data: Value| {
            let mut frame = json!({ "name": response, "data": data });
            if options.echo_ids
                && let Some(id) = message.get("id")
            {
                frame["id"] = id.clone();
            }
            frame
        };
        let changed = |change: &str| json!({ "name": "formautofill-storage-changed", "data": change });

        match name {
            "FormAutofillTest:AddAddress" => {
                let mut record: Record =
                    serde_json::from_value(data["address"].clone()).unwrap_or_default();
                self.next_guid += 1;
                record.set_guid(&RecordId::new(format!("guid-{}", self.next_guid)));
                self.records.push(record);
                vec![
                    changed("add"),
                    reply("FormAutofillTest:AddressAdded", json!({})),
                ]
            }

            "FormAutofillTest:RemoveAddress" => {
                let guid = data["guid"].as_str().unwrap_or_default();
                match self.position(guid) {
                    Some(index) => {
                        self.records.remove(index);
                        vec![
                            changed("remove"),
                            reply("FormAutofillTest:AddressRemoved", json!({})),
                        ]
                    }
                    None => Vec::new(),
                }
            }

            "FormAutofillTest:UpdateAddress" => {
                let guid = data["guid"].as_str().unwrap_or_default();
                match self.position(guid) {
                    Some(index) => {
                        let mut record: Record =
                            serde_json::from_value(data["address"].clone()).unwrap_or_default();
                        record.set_guid(&RecordId::new(guid));
                        self.records[index] = record;
                        vec![
                            changed("update"),
                            reply("FormAutofillTest:AddressUpdated", json!({})),
                        ]
                    }
                    None => Vec::new(),
                }
            }

            "FormAutofillTest:GetAddresses" => {
                let records = serde_json::to_value(&self.records).unwrap_or_default();
                vec![reply("FormAutofillTest:Addresses", records)]
            }

            "cleanup" => {
                self.records.clear();
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    fn position(&self, guid: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.guid().is_some_and(|id| id.as_str() == guid))
    }
}
