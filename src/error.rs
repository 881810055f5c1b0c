//! Error types for the autofill bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use autofill_bridge::{Bridge, Result};
//!
//! async fn example(bridge: &Bridge) -> Result<()> {
//!     let records = bridge.get_all_records().await?;
//!     println!("{} records stored", records.len());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnexpectedResponse`], [`Error::RequestTimeout`] |
//! | Records | [`Error::RecordCountMismatch`], [`Error::RecordMismatch`], [`Error::UnexpectedChange`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timeout waiting for the backing context to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while a request was outstanding or being sent.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed payload.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A response was correlated to a request but carried the wrong name.
    #[error("Unexpected response to {request_id}: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// The request the response was correlated with.
        request_id: RequestId,
        /// Response name the request expects.
        expected: String,
        /// Response name actually received.
        actual: String,
    },

    /// Caller-imposed request timeout expired.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Record Errors
    // ========================================================================
    /// Stored record count differs from the expected count.
    #[error("Record count mismatch: expected {expected}, found {actual}")]
    RecordCountMismatch {
        /// Number of records expected.
        expected: usize,
        /// Number of records stored.
        actual: usize,
    },

    /// An expected record has no matching stored record.
    #[error("No stored record matches expected record #{index}")]
    RecordMismatch {
        /// Position of the unmatched record in the expected list.
        index: usize,
    },

    /// A storage-change notification carried an unexpected change type.
    #[error("Unexpected storage change: expected {expected}, got {actual}")]
    UnexpectedChange {
        /// Change type awaited.
        expected: String,
        /// Change type received.
        actual: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Invalid URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            timeout_ms: saturating_millis(timeout),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unexpected response error.
    #[inline]
    pub fn unexpected_response(
        request_id: RequestId,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::UnexpectedResponse {
            request_id,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout: Duration) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms: saturating_millis(timeout),
        }
    }

    /// Creates an unexpected change error.
    #[inline]
    pub fn unexpected_change(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::UnexpectedChange {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Whole milliseconds in `duration`, capped at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came from a record check.
    #[inline]
    #[must_use]
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::RecordCountMismatch { .. }
                | Self::RecordMismatch { .. }
                | Self::UnexpectedChange { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
