//! Bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use autofill_bridge::BridgeConfig;
//!
//! let config = BridgeConfig::new()
//!     .with_port(9222)
//!     .with_request_timeout(Duration::from_secs(5))
//!     .with_max_pending(16);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the backing context to connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on outstanding requests.
pub const DEFAULT_MAX_PENDING: usize = 100;

/// Default buffer size for storage-change subscriptions.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// BridgeConfig
// ============================================================================

/// Connection and request settings for a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Address the listening server binds to.
    pub bind_ip: IpAddr,

    /// Port the listening server binds to (0 = OS-assigned).
    pub port: u16,

    /// How long `accept` waits for the backing context.
    pub connect_timeout: Duration,

    /// Timeout applied to every request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Outstanding requests allowed before new ones are rejected.
    pub max_pending: usize,

    /// Buffered storage-change notifications per subscriber.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_pending: DEFAULT_MAX_PENDING,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeConfig {
    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets the bind port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Applies a timeout to every request.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the outstanding request cap.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Sets the storage-change buffer size.
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeConfig {
    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_pending` or `event_capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
