//! Graceful shutdown coordination
//!
//! On shutdown the [`DrainCoordinator`] stops the listener, arms the drain
//! timeout and checks the [`RequestTracker`] every poll interval. Whichever of
//! {timeout, tracker empty} comes first resolves the drain signal; shutdown
//! completes once that signal has resolved *and* the listener has stopped.
//!
//! Timing out only ends the wait. Requests still running are never cancelled
//! by the coordinator.

use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::DrainConfig;
use crate::error::DrainResult;
use crate::lifecycle::{DrainState, ShutdownHandle, ShutdownOutcome, ShutdownReport};
use crate::listener::Listener;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::signal::CompletionSignal;
use crate::tracker::RequestTracker;

/// Orchestrates the shutdown sequence
#[derive(Debug)]
pub struct DrainCoordinator {
    config: DrainConfig,
    tracker: Arc<RequestTracker>,
    listener: Arc<dyn Listener>,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<Mutex<DrainState>>,
    /// Resolved by the timeout or by the drain check, whichever fires first
    drained: CompletionSignal<ShutdownOutcome>,
    /// Resolved once the whole sequence has finished
    complete: CompletionSignal<ShutdownReport>,
}

impl DrainCoordinator {
    /// Create a coordinator in the `Running` state
    pub fn new(
        config: DrainConfig,
        tracker: Arc<RequestTracker>,
        listener: Arc<dyn Listener>,
        scheduler: Arc<dyn Scheduler>,
    ) -> DrainResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracker,
            listener,
            scheduler,
            state: Arc::new(Mutex::new(DrainState::Running)),
            drained: CompletionSignal::new(),
            complete: CompletionSignal::new(),
        })
    }

    /// Drain configuration
    #[must_use]
    pub const fn config(&self) -> &DrainConfig {
        &self.config
    }

    /// Tracker whose requests are drained
    #[must_use]
    pub const fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> DrainState {
        *self.state.lock()
    }

    /// Get a handle for triggering shutdown from elsewhere
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(self))
    }

    /// Start shutdown when the scheduler reports that the process is terminating
    pub fn install(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        self.scheduler.on_shutdown_requested(Box::new(move || {
            tokio::spawn(async move {
                coordinator.shutdown().await;
            });
        }));
    }

    /// Wait for shutdown to complete, however it was triggered
    pub async fn completed(&self) -> ShutdownReport {
        self.complete.wait().await
    }

    /// Run the shutdown sequence and wait for it to complete
    ///
    /// Only the first call drives the sequence; later calls wait for it and
    /// return the same report.
    pub async fn shutdown(&self) -> ShutdownReport {
        if !self.begin_draining() {
            tracing::debug!("Shutdown already in progress");
            return self.complete.wait().await;
        }

        let started = Instant::now();
        tracing::info!(
            in_flight = self.tracker.size(),
            timeout = ?self.config.timeout,
            "Shutdown requested, draining in-flight requests"
        );

        let listener = Arc::clone(&self.listener);
        let listener_closed = tokio::spawn(async move { listener.stop_listening().await });

        let timer = self.arm_timeout();
        let poll = self.start_polling();

        let outcome = self.drained.wait().await;
        self.settle(outcome);

        match listener_closed.await {
            Ok(Ok(())) => tracing::debug!("Listener stopped"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Listener failed to stop cleanly"),
            Err(e) => tracing::warn!(error = %e, "Listener stop task failed"),
        }

        timer.cancel();
        if let Some(poll) = poll {
            poll.cancel();
        }

        *self.state.lock() = DrainState::ShutdownComplete;
        let report = ShutdownReport {
            outcome,
            outstanding: self.tracker.size(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            %outcome,
            outstanding = report.outstanding,
            elapsed = ?report.elapsed,
            "Shutdown complete"
        );
        self.complete.resolve(report);
        report
    }

    /// `Running -> Draining`, at most once
    fn begin_draining(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state != DrainState::Running {
                return false;
            }
            *state = DrainState::Draining;
        }
        true
    }

    /// `Draining -> {DrainedCleanly | ForcedAfterTimeout}`
    ///
    /// Written by the task driving the sequence, so it always lands before
    /// `ShutdownComplete`.
    fn settle(&self, outcome: ShutdownOutcome) {
        let mut state = self.state.lock();
        if *state == DrainState::Draining {
            *state = outcome.into();
        }
    }

    fn arm_timeout(&self) -> TimerHandle {
        let tracker = Arc::clone(&self.tracker);
        let drained = self.drained.clone();
        self.scheduler.after(
            self.config.timeout,
            Box::new(move || {
                let outstanding = tracker.size();
                if drained.resolve(ShutdownOutcome::ForcedAfterTimeout) {
                    tracing::warn!(
                        outstanding,
                        "Drain timeout reached, no longer waiting for {outstanding} requests"
                    );
                }
            }),
        )
    }

    /// Check once now, then every poll interval until the drain signal resolves
    fn start_polling(&self) -> Option<TimerHandle> {
        if check_drained(&self.tracker, &self.drained) {
            return None;
        }

        let tracker = Arc::clone(&self.tracker);
        let drained = self.drained.clone();
        Some(self.scheduler.every(
            self.config.poll_interval,
            Box::new(move || {
                if check_drained(&tracker, &drained) {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }),
        ))
    }
}

/// Resolve `drained` if no request is in flight; true once the signal is resolved
fn check_drained(
    tracker: &RequestTracker,
    drained: &CompletionSignal<ShutdownOutcome>,
) -> bool {
    if drained.is_resolved() {
        return true;
    }

    let in_flight = tracker.size();
    if in_flight == 0 {
        if drained.resolve(ShutdownOutcome::DrainedCleanly) {
            tracing::info!("No pending requests, shutting down");
        }
        true
    } else {
        tracing::info!(in_flight, "{in_flight} requests still running, waiting");
        false
    }
}
