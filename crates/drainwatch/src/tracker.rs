//! In-flight request tracking
//!
//! The [`RequestTracker`] holds the set of requests that are currently
//! executing. Integrations must pair every `register` with exactly one
//! `unregister`: a registration that is never released keeps the tracker
//! non-empty forever, so every shutdown ends in
//! [`ShutdownOutcome::ForcedAfterTimeout`](crate::ShutdownOutcome).
//! [`RequestTracker::track`] hands out a [`RequestGuard`] that releases the
//! registration on drop and is the easiest way to uphold that.

use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DrainError, DrainResult};

/// Opaque identifier of one in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of requests currently executing
///
/// Writers are the request lifecycle hooks (one register/unregister pair per
/// request); the reader is the drain poll loop.
#[derive(Debug, Default)]
pub struct RequestTracker {
    active: DashSet<RequestId>,
}

impl RequestTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the active set
    ///
    /// Fails with [`DrainError::AlreadyTracked`] if `id` is already present.
    pub fn register(&self, id: RequestId) -> DrainResult<()> {
        if !self.active.insert(id) {
            tracing::error!(request_id = %id, "Request registered twice");
            return Err(DrainError::AlreadyTracked(id));
        }
        tracing::trace!(request_id = %id, in_flight = self.active.len(), "Request registered");
        Ok(())
    }

    /// Remove `id` from the active set
    ///
    /// Returns whether the id was present. Absent ids are tolerated so that a
    /// completion arriving after a forced shutdown never fails.
    pub fn unregister(&self, id: RequestId) -> bool {
        let removed = self.active.remove(&id).is_some();
        if removed {
            tracing::trace!(request_id = %id, in_flight = self.active.len(), "Request finished");
        } else {
            tracing::debug!(request_id = %id, "Unregister for untracked request ignored");
        }
        removed
    }

    /// Number of requests in flight
    #[must_use]
    pub fn size(&self) -> usize {
        self.active.len()
    }

    /// Whether no request is in flight
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether `id` is currently in flight
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.active.contains(id)
    }

    /// Ids currently in flight, in no particular order
    #[must_use]
    pub fn snapshot(&self) -> Vec<RequestId> {
        self.active.iter().map(|id| *id).collect()
    }

    /// Register a freshly generated id and return a guard that unregisters it on drop
    #[must_use]
    pub fn track(self: &Arc<Self>) -> RequestGuard {
        // A fresh v4 id cannot collide with a live one, retry anyway rather than panic.
        loop {
            let id = RequestId::new();
            if self.register(id).is_ok() {
                return RequestGuard {
                    id,
                    tracker: Arc::clone(self),
                };
            }
        }
    }
}

/// RAII registration of one request
///
/// Unregisters exactly once when dropped, including when the owning future is
/// dropped mid-flight (client disconnect, cancellation, panic unwinding).
#[derive(Debug)]
#[must_use = "dropping the guard immediately unregisters the request"]
pub struct RequestGuard {
    id: RequestId,
    tracker: Arc<RequestTracker>,
}

impl RequestGuard {
    /// Id this guard keeps registered
    pub const fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.tracker.unregister(self.id);
    }
}
