//! Message types exchanged with the backing context.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Script → Store | Storage command |
//! | `Response` | Store → Script | Completion of one request |
//! | `Event` | Store → Script | Unsolicited notification |
//!
//! Requests carry a UUID `id` the store echoes on the response. Responses
//! without an `id` are matched to the oldest request awaiting that name.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Commands and response names |
//! | `event` | Notifications |
//! | `record` | Address records and comparison |
//! | `request` | Request, Response and raw envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Commands and their response names.
pub mod command;

/// Notification types.
pub mod event;

/// Address records.
pub mod record;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, ResponseKind};
pub use event::{ChangeType, Event, ParsedEvent};
pub use record::{AddressField, Record, records_match};
pub use request::{Envelope, Incoming, Request, Response};
