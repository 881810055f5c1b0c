//! WebSocket transport layer.
//!
//! This module carries requests from the test script to the backing
//! context and routes responses and notifications back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Test script    │                              │  Backing        │
//! │  (Rust)         │         WebSocket            │  context        │
//! │  Connection     │◄────────────────────────────►│  (record store) │
//! │  + correlation  │      localhost:PORT          │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` or `client::connect`
//! 2. `PendingServer::accept` - Wait for the backing context to connect
//! 3. `Connection` - Send requests, receive responses/events
//! 4. `Connection::shutdown` - Close the socket, fail pending requests
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Dialing a listening backing context |
//! | `connection` | WebSocket connection and event loop |
//! | `correlation` | Pending request table |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound connection.
pub mod client;

/// WebSocket connection and event loop.
pub mod connection;

/// Pending request table.
pub mod correlation;

/// WebSocket server for the backing context.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::connect;
pub use connection::{Connection, EventHandler};
pub use correlation::CorrelationTable;
pub use server::PendingServer;
