//! Shutdown lifecycle states, outcomes and the external shutdown handle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::DrainCoordinator;

/// Drain coordinator states
///
/// `Running -> Draining -> {DrainedCleanly | ForcedAfterTimeout} -> ShutdownComplete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainState {
    /// Serving normally, no shutdown requested
    Running,
    /// Listener stop issued, waiting for in-flight requests
    Draining,
    /// Every tracked request finished before the timeout
    DrainedCleanly,
    /// The timeout fired first; waiting was abandoned
    ForcedAfterTimeout,
    /// Drain resolved and the listener has stopped; the process may exit
    ShutdownComplete,
}

impl DrainState {
    /// Whether shutdown has been initiated
    #[must_use]
    pub const fn is_shutting_down(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// How the drain wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutdownOutcome {
    /// The tracker was empty when the wait ended
    DrainedCleanly,
    /// The timeout fired while requests were still outstanding
    ForcedAfterTimeout,
}

impl From<ShutdownOutcome> for DrainState {
    fn from(outcome: ShutdownOutcome) -> Self {
        match outcome {
            ShutdownOutcome::DrainedCleanly => Self::DrainedCleanly,
            ShutdownOutcome::ForcedAfterTimeout => Self::ForcedAfterTimeout,
        }
    }
}

impl fmt::Display for ShutdownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DrainedCleanly => f.write_str("drained cleanly"),
            Self::ForcedAfterTimeout => f.write_str("forced after timeout"),
        }
    }
}

/// Summary of a completed shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// How the drain wait ended
    pub outcome: ShutdownOutcome,
    /// Requests still in flight when shutdown completed
    pub outstanding: usize,
    /// Time from the shutdown trigger to completion
    pub elapsed: Duration,
}

/// Handle for triggering graceful shutdown
///
/// Cloneable; every clone drives the same coordinator, and triggering more
/// than once is harmless.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<DrainCoordinator>,
}

impl ShutdownHandle {
    pub(crate) const fn new(coordinator: Arc<DrainCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Trigger graceful shutdown and wait for it to complete
    pub async fn shutdown(&self) -> ShutdownReport {
        self.coordinator.shutdown().await
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.coordinator.state().is_shutting_down()
    }

    /// Wait for a shutdown triggered elsewhere to complete
    pub async fn completed(&self) -> ShutdownReport {
        self.coordinator.completed().await
    }
}
