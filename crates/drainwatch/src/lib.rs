//! # drainwatch
//!
//! Graceful shutdown for network servers: when the process is asked to
//! terminate, stop accepting connections, let in-flight requests finish up to
//! a bounded timeout, and only then let the process exit.
//!
//! ## Features
//!
//! - **Request Tracking** - [`RequestTracker`] with RAII [`RequestGuard`]s
//! - **Write-Once Signal** - [`CompletionSignal`] with idempotent resolution
//! - **Drain Coordination** - [`DrainCoordinator`] racing drain against timeout
//! - **Tower Integration** - [`DrainLayer`] tracks every call of a service
//! - **Signal Handling** - SIGINT / SIGTERM through [`TokioScheduler`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use drainwatch::{DrainConfig, DrainCoordinator, ListenerGate, RequestTracker, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = Arc::new(RequestTracker::new());
//!     let gate = ListenerGate::new();
//!
//!     let coordinator = Arc::new(DrainCoordinator::new(
//!         DrainConfig::new(Duration::from_secs(30)),
//!         Arc::clone(&tracker),
//!         Arc::new(gate.clone()),
//!         Arc::new(TokioScheduler::new()),
//!     )?);
//!     coordinator.install();
//!
//!     // Accept loop selects on `gate.stopped()` and calls `gate.mark_closed()`;
//!     // each request holds `tracker.track()` while it runs.
//!
//!     let report = coordinator.completed().await;
//!     println!("shutdown {}", report.outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Integration contract
//!
//! Every request registered with the tracker must be unregistered exactly
//! once. A leaked registration keeps the tracker non-empty, so every
//! shutdown waits for the full timeout.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,  // Error documentation in progress
    clippy::must_use_candidate,  // Too pedantic for library APIs
    clippy::return_self_not_must_use  // Constructor methods don't need must_use
)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod middleware;
pub mod scheduler;
pub mod signal;
pub mod tracker;

// Re-export main types for convenience
pub use config::{DEFAULT_POLL_INTERVAL, DrainConfig, DrainConfigBuilder, LoggingConfig};
pub use coordinator::DrainCoordinator;
pub use error::{DrainError, DrainResult};
pub use lifecycle::{DrainState, ShutdownHandle, ShutdownOutcome, ShutdownReport};
pub use listener::{Listener, ListenerGate};
pub use middleware::{
    DrainLayer, DrainService, RequestInterceptor, TrackedFuture, TrackingInterceptor, tracked,
};
pub use scheduler::{Scheduler, TimerHandle, TokioScheduler, shutdown_signal};
pub use signal::CompletionSignal;
pub use tracker::{RequestGuard, RequestId, RequestTracker};

/// Prelude for common drain functionality
pub mod prelude {
    pub use crate::{
        CompletionSignal, DrainConfig, DrainCoordinator, DrainError, DrainLayer, DrainResult,
        DrainState, Listener, ListenerGate, RequestGuard, RequestId, RequestTracker, Scheduler,
        ShutdownHandle, ShutdownOutcome, ShutdownReport, TokioScheduler,
    };
}
