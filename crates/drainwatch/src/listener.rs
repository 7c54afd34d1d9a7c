//! Listener boundary
//!
//! The accept loop lives outside this crate. The coordinator only needs to
//! tell it to stop accepting connections and learn when it has done so.

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::DrainResult;
use crate::signal::CompletionSignal;

/// A component accepting inbound connections
#[async_trait]
pub trait Listener: Send + Sync + std::fmt::Debug {
    /// Stop accepting new connections
    ///
    /// Completes once the listener has fully stopped.
    async fn stop_listening(&self) -> DrainResult<()>;
}

/// [`Listener`] for accept loops driven by the application
///
/// The accept loop selects on [`stopped`](Self::stopped), drops its socket,
/// then calls [`mark_closed`](Self::mark_closed).
///
/// ```no_run
/// # use drainwatch::ListenerGate;
/// # async fn serve(gate: ListenerGate, listener: tokio::net::TcpListener) {
/// loop {
///     tokio::select! {
///         () = gate.stopped() => break,
///         _accepted = listener.accept() => { /* hand the connection off */ }
///     }
/// }
/// drop(listener);
/// gate.mark_closed();
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ListenerGate {
    stop: CancellationToken,
    closed: CompletionSignal<()>,
}

impl ListenerGate {
    /// Create an open gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once stopping has been requested
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    /// Whether stopping has been requested
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Report that the accept loop has released its socket
    pub fn mark_closed(&self) {
        if self.closed.resolve(()) {
            tracing::debug!("Listener closed");
        }
    }

    /// Whether the accept loop has reported closure
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_resolved()
    }
}

#[async_trait]
impl Listener for ListenerGate {
    async fn stop_listening(&self) -> DrainResult<()> {
        tracing::info!("Stopping listener");
        self.stop.cancel();
        self.closed.wait().await;
        Ok(())
    }
}
