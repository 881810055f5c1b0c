//! Outbound WebSocket connection to a listening backing context.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

use super::Connection;

// ============================================================================
// Connect
// ============================================================================

/// Dials a backing context that is already listening.
///
/// # Errors
///
/// - [`Error::Url`] if `url` does not parse
/// - [`Error::Config`] if the scheme is not `ws` or `wss`
/// - [`Error::Connection`] if the handshake fails
pub async fn connect(url: &str, max_pending: usize) -> Result<Connection> {
    let url = parse_ws_url(url)?;

    debug!(%url, "Connecting to backing context");

    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

    info!(%url, "WebSocket connection established");

    Ok(Connection::new(ws_stream, max_pending))
}

/// Parses and checks a WebSocket URL.
fn parse_ws_url(url: &str) -> Result<Url> {
    let url = Url::parse(url)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::config(format!(
            "unsupported scheme {other:?}, expected ws or wss"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
