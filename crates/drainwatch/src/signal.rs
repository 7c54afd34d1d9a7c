//! Write-once completion signal
//!
//! [`CompletionSignal`] resolves the race between the drain timeout and the
//! drain-complete check. Only the first [`resolve`](CompletionSignal::resolve)
//! takes effect; later calls are silent no-ops, so both trigger sites can fire
//! without coordinating with each other.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

type Continuation<T> = Box<dyn FnOnce(T) + Send + 'static>;

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Resolved(T),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// One-shot, idempotent notification carrying a value
///
/// Cloning yields another handle to the same signal.
pub struct CompletionSignal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CompletionSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        let mut s = f.debug_struct("CompletionSignal");
        match &*state {
            State::Pending(continuations) => s
                .field("resolved", &false)
                .field("continuations", &continuations.len()),
            State::Resolved(value) => s.field("resolved", &true).field("value", value),
        };
        s.finish()
    }
}

impl<T> Default for CompletionSignal<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionSignal<T>
where
    T: Clone + Send + 'static,
{
    /// Create an unresolved signal
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Vec::new())),
                notify: Notify::new(),
            }),
        }
    }

    /// Resolve with `value`
    ///
    /// Returns `true` if this call resolved the signal and `false` if it was
    /// already resolved, in which case `value` is discarded.
    pub fn resolve(&self, value: T) -> bool {
        let continuations = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Resolved(_) => return false,
                State::Pending(continuations) => {
                    let continuations = std::mem::take(continuations);
                    *state = State::Resolved(value.clone());
                    continuations
                }
            }
        };

        // Run outside the lock so a continuation may inspect the signal.
        for continuation in continuations {
            continuation(value.clone());
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Register a continuation
    ///
    /// Runs exactly once with the resolved value: immediately if the signal is
    /// already resolved, otherwise on the first `resolve`.
    pub fn on_resolved<F>(&self, continuation: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let value = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending(continuations) => {
                    continuations.push(Box::new(continuation));
                    return;
                }
                State::Resolved(value) => value.clone(),
            }
        };
        continuation(value);
    }

    /// Wait for the signal to resolve and return its value
    pub async fn wait(&self) -> T {
        loop {
            // Notified futures observe notify_waiters as soon as they are created.
            let notified = self.inner.notify.notified();
            if let Some(value) = self.get() {
                return value;
            }
            notified.await;
        }
    }

    /// Resolved value, if any
    #[must_use]
    pub fn get(&self) -> Option<T> {
        match &*self.inner.state.lock() {
            State::Pending(_) => None,
            State::Resolved(value) => Some(value.clone()),
        }
    }

    /// Whether the signal has been resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Resolved(_))
    }
}
