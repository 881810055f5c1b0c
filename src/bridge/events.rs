//! Caller-owned state for unsolicited notifications.
//!
//! The bridge installs one event handler on its connection. Storage changes
//! fan out to [`StorageChanges`] subscriptions; popup results replace the
//! value held in a watch channel.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::{RecvError as BroadcastRecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{ChangeType, Event, ParsedEvent};
use crate::transport::{Connection, EventHandler};

// ============================================================================
// EventState
// ============================================================================

/// Notification state shared between a bridge and its event handler.
#[derive(Clone)]
pub(crate) struct EventState {
    changes: broadcast::Sender<ChangeType>,
    popup: Arc<watch::Sender<Option<Vec<Value>>>>,
}

impl EventState {
    pub(crate) fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        let (popup, _) = watch::channel(None);
        Self {
            changes,
            popup: Arc::new(popup),
        }
    }

    /// Builds the handler that feeds this state.
    pub(crate) fn handler(&self) -> EventHandler {
        let state = self.clone();
        Box::new(move |event: Event| match event.parsed {
            ParsedEvent::StorageChanged(change) => {
                debug!(%change, "Storage changed");
                // No subscribers is fine.
                let _ = state.changes.send(change);
            }
            ParsedEvent::PopupShown { results } => {
                debug!(count = results.len(), "Popup shown");
                state.popup.send_replace(Some(results));
            }
        })
    }

    pub(crate) fn subscribe(&self, connection: Connection) -> StorageChanges {
        StorageChanges {
            receiver: self.changes.subscribe(),
            connection,
        }
    }

    pub(crate) fn last_popup_results(&self) -> Option<Vec<Value>> {
        self.popup.borrow().clone()
    }

    pub(crate) fn popup_receiver(&self) -> watch::Receiver<Option<Vec<Value>>> {
        self.popup.subscribe()
    }
}

// ============================================================================
// StorageChanges
// ============================================================================

/// Subscription to storage-changed notifications.
///
/// Only changes that arrive after the subscription is created are seen, so
/// subscribe before issuing the request that triggers the change.
///
/// # Example
///
/// ```ignore
/// let mut changes = bridge.storage_changes();
/// bridge.add_record(&record).await?;
/// changes.expect(ChangeType::Add).await?;
/// ```
pub struct StorageChanges {
    receiver: broadcast::Receiver<ChangeType>,
    connection: Connection,
}

impl StorageChanges {
    /// Waits for the next storage change.
    ///
    /// Changes already buffered are returned even after the connection
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the connection is closed and
    /// the buffer is drained.
    pub async fn next(&mut self) -> Result<ChangeType> {
        loop {
            let received = tokio::select! {
                biased;

                received = self.receiver.recv() => received,

                () = self.connection.closed() => match self.receiver.try_recv() {
                    Ok(change) => Ok(change),
                    Err(TryRecvError::Lagged(skipped)) => Err(BroadcastRecvError::Lagged(skipped)),
                    Err(_) => return Err(Error::ConnectionClosed),
                },
            };

            match received {
                Ok(change) => return Ok(change),
                Err(BroadcastRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Storage change subscriber lagged");
                }
                Err(BroadcastRecvError::Closed) => return Err(Error::ConnectionClosed),
            }
        }
    }

    /// Waits for the next storage change and checks its type.
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedChange`] if the next change differs from `expected`
    /// - [`Error::ConnectionClosed`] as for [`next`](Self::next)
    pub async fn expect(&mut self, expected: ChangeType) -> Result<()> {
        let actual = self.next().await?;
        if actual == expected {
            Ok(())
        } else {
            Err(Error::unexpected_change(expected.as_str(), actual.as_str()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
