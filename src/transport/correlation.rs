//! Correlation table for outstanding requests.
//!
//! Each pending request is stored under its [`RequestId`] together with the
//! response name it waits for. A per-name FIFO queue resolves responses that
//! arrive without an ID: the oldest request expecting that name wins.
//! Requests whose waiter has gone away are skipped and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Response, ResponseKind};

// ============================================================================
// Types
// ============================================================================

/// Single-use completion handle for one request.
pub type Completion = oneshot::Sender<Result<Response>>;

/// A request waiting for its response.
struct PendingRequest {
    expected: ResponseKind,
    completion: Completion,
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Outstanding requests keyed by correlation ID.
///
/// Not synchronized; the connection wraps it in a mutex.
#[derive(Default)]
pub struct CorrelationTable {
    pending: FxHashMap<RequestId, PendingRequest>,
    by_kind: FxHashMap<ResponseKind, VecDeque<RequestId>>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending request.
    ///
    /// Replaces and fails any previous entry with the same ID.
    pub fn register(&mut self, id: RequestId, expected: ResponseKind, completion: Completion) {
        if let Some(previous) = self.pending.insert(
            id,
            PendingRequest {
                expected,
                completion,
            },
        ) {
            self.unlink(id, previous.expected);
            let _ = previous
                .completion
                .send(Err(Error::protocol(format!("duplicate request id {id}"))));
        }
        self.by_kind.entry(expected).or_default().push_back(id);
    }

    /// Removes a pending request without completing it.
    ///
    /// Returns `true` if the entry existed. Dropping the handle wakes the
    /// waiter with a receive error.
    pub fn remove(&mut self, id: RequestId) -> bool {
        match self.pending.remove(&id) {
            Some(entry) => {
                self.unlink(id, entry.expected);
                true
            }
            None => false,
        }
    }

    /// Completes a pending request with `error`.
    ///
    /// Returns `true` if the entry existed.
    pub fn fail(&mut self, id: RequestId, error: Error) -> bool {
        match self.pending.remove(&id) {
            Some(entry) => {
                self.unlink(id, entry.expected);
                let _ = entry.completion.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fulfils the request a response belongs to.
    ///
    /// Returns the response back if no pending request claims it.
    pub fn resolve(&mut self, response: Response) -> std::result::Result<RequestId, Response> {
        let id = match response.id {
            Some(id) if self.pending.contains_key(&id) => id,
            Some(_) => return Err(response),
            None => match self.oldest_waiting(response.kind) {
                Some(id) => id,
                None => return Err(response),
            },
        };

        let Some(entry) = self.pending.remove(&id) else {
            return Err(response);
        };
        self.unlink(id, entry.expected);

        let outcome = if entry.expected == response.kind {
            Ok(response)
        } else {
            Err(Error::unexpected_response(
                id,
                entry.expected.as_str(),
                response.kind.as_str(),
            ))
        };
        let _ = entry.completion.send(outcome);

        Ok(id)
    }

    /// Fails every pending request with `error_fn()` and empties the table.
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&mut self, error_fn: impl Fn() -> Error) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.completion.send(Err(error_fn()));
        }
        self.by_kind.clear();
        count
    }

    /// Number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of outstanding requests awaiting `kind`.
    #[must_use]
    pub fn pending_for(&self, kind: ResponseKind) -> usize {
        self.by_kind.get(&kind).map_or(0, VecDeque::len)
    }

    /// Oldest request awaiting `kind` whose waiter is still listening.
    fn oldest_waiting(&mut self, kind: ResponseKind) -> Option<RequestId> {
        loop {
            let id = *self.by_kind.get(&kind)?.front()?;
            let abandoned = self
                .pending
                .get(&id)
                .is_none_or(|entry| entry.completion.is_closed());
            if !abandoned {
                return Some(id);
            }
            self.pending.remove(&id);
            self.unlink(id, kind);
        }
    }

    fn unlink(&mut self, id: RequestId, kind: ResponseKind) {
        if let Some(queue) = self.by_kind.get_mut(&kind) {
            queue.retain(|queued| *queued != id);
            if queue.is_empty() {
                self.by_kind.remove(&kind);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
