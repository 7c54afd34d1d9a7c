//! Delayed-call scheduling and the shutdown-signal subscription point
//!
//! The coordinator never sleeps itself: it asks a [`Scheduler`] to run the
//! timeout and the drain checks later, and to tell it when the host process
//! begins termination. [`TokioScheduler`] is the implementation backed by
//! `tokio::time` and `tokio::signal`.

use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One-shot task run by [`Scheduler::after`]
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Repeating task run by [`Scheduler::every`]; returning `Break` stops the loop
pub type RepeatingTask = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Handle to a scheduled task
///
/// Dropping the handle does not cancel the task.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Create a handle around a cancellation token the task observes
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Prevent the task from running again
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Scheduler capabilities the drain coordinator depends on
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Run `task` once after `delay`
    ///
    /// A zero delay runs the task on the next scheduler tick, never inline.
    fn after(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Run `task` every `period`, starting one period from now, until it
    /// returns `ControlFlow::Break` or the handle is cancelled
    fn every(&self, period: Duration, task: RepeatingTask) -> TimerHandle;

    /// Invoke `callback` once when the host process begins termination
    fn on_shutdown_requested(&self, callback: Task);
}

/// [`Scheduler`] running on the ambient tokio runtime
///
/// Must be used from within a tokio runtime context.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    /// Manual shutdown trigger, fired by [`TokioScheduler::request_shutdown`]
    trigger: CancellationToken,
    /// Also listen for SIGINT / SIGTERM
    os_signals: bool,
}

impl TokioScheduler {
    /// Scheduler that reports SIGINT, SIGTERM and manual requests as shutdown
    #[must_use]
    pub fn new() -> Self {
        Self {
            trigger: CancellationToken::new(),
            os_signals: true,
        }
    }

    /// Scheduler that only reports manual shutdown requests
    #[must_use]
    pub fn without_signals() -> Self {
        Self {
            trigger: CancellationToken::new(),
            os_signals: false,
        }
    }

    /// Fire every `on_shutdown_requested` subscription
    pub fn request_shutdown(&self) {
        self.trigger.cancel();
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(delay) => task(),
            }
        });
        TimerHandle::new(token)
    }

    fn every(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        if task().is_break() {
                            break;
                        }
                    }
                }
            }
        });
        TimerHandle::new(token)
    }

    fn on_shutdown_requested(&self, callback: Task) {
        let trigger = self.trigger.clone();
        let os_signals = self.os_signals;
        tokio::spawn(async move {
            if os_signals {
                tokio::select! {
                    () = trigger.cancelled() => tracing::info!("Shutdown requested"),
                    () = shutdown_signal() => {}
                }
            } else {
                trigger.cancelled().await;
                tracing::info!("Shutdown requested");
            }
            callback();
        });
    }
}

/// Resolve when the process receives Ctrl+C or, on unix, SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl+C received, initiating shutdown"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("SIGTERM received, initiating shutdown");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
