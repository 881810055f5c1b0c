//! Autofill Bridge - request/response bridge to a privileged address store.
//!
//! This library lets a form-autofill test script drive the privileged
//! context that holds address records, over an asynchronous message
//! channel.
//!
//! # Architecture
//!
//! - **Test script (Rust)**: sends named requests, awaits responses,
//!   subscribes to notifications
//! - **Backing context**: owns the record store, answers each request with
//!   exactly one named response, pushes storage-changed and popup-shown
//!   notifications
//!
//! Key design principles:
//!
//! - Each request carries a UUID correlation ID; responses without one are
//!   matched FIFO per response name
//! - A correlation entry is removed the moment its response arrives
//! - Notification state lives in the [`Bridge`], never in globals
//! - No built-in request timeout; callers opt in via [`BridgeConfig`]
//!
//! # Quick Start
//!
//! ```no_run
//! use autofill_bridge::{AddressField, Bridge, BridgeConfig, ChangeType, Record, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Bridge::connect("ws://127.0.0.1:9300", BridgeConfig::default()).await?;
//!
//!     let record = Record::new()
//!         .with(AddressField::GivenName, "John")
//!         .with(AddressField::FamilyName, "Smith");
//!
//!     let mut changes = bridge.storage_changes();
//!     bridge.add_record(&record).await?;
//!     changes.expect(ChangeType::Add).await?;
//!
//!     bridge.check_records(&[record]).await?;
//!     bridge.close()
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`] and record operations |
//! | [`config`] | [`BridgeConfig`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and records |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Bridge to the backing store.
pub mod bridge;

/// Bridge configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// WebSocket transport layer.
///
/// Handles the socket, the event loop and request correlation.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::events::StorageChanges;
pub use bridge::{Bridge, PendingBridge};

// Configuration
pub use config::BridgeConfig;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RecordId, RequestId};

// Protocol types
pub use protocol::{AddressField, ChangeType, Command, Record, records_match};
