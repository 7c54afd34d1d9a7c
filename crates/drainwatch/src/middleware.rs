//! Request lifecycle hooks
//!
//! The surrounding server reports request start and finish either through an
//! explicit [`RequestInterceptor`], or by wrapping its tower service in a
//! [`DrainLayer`] so every call is tracked for the life of its response
//! future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::error::DrainResult;
use crate::tracker::{RequestGuard, RequestId, RequestTracker};

/// Hooks the server calls around each request
///
/// `on_request_finish` must be called exactly once per successful
/// `on_request_start`, whatever the request's outcome.
pub trait RequestInterceptor: Send + Sync {
    /// A request has begun executing
    fn on_request_start(&self, id: RequestId) -> DrainResult<()>;

    /// A request has ended (success, error or client disconnect)
    fn on_request_finish(&self, id: RequestId);

    /// Get interceptor name
    fn name(&self) -> &str;
}

/// Interceptor feeding a [`RequestTracker`]
#[derive(Debug, Clone)]
pub struct TrackingInterceptor {
    tracker: Arc<RequestTracker>,
}

impl TrackingInterceptor {
    /// Create an interceptor for `tracker`
    #[must_use]
    pub const fn new(tracker: Arc<RequestTracker>) -> Self {
        Self { tracker }
    }
}

impl RequestInterceptor for TrackingInterceptor {
    fn on_request_start(&self, id: RequestId) -> DrainResult<()> {
        self.tracker.register(id)
    }

    fn on_request_finish(&self, id: RequestId) {
        self.tracker.unregister(id);
    }

    fn name(&self) -> &str {
        "tracking"
    }
}

/// Keep a request registered until `future` completes or is dropped
pub fn tracked<F: Future>(tracker: &Arc<RequestTracker>, future: F) -> TrackedFuture<F> {
    TrackedFuture::new(future, tracker.track())
}

/// A layer that tracks every request passing through the wrapped service
#[derive(Debug, Clone)]
pub struct DrainLayer {
    tracker: Arc<RequestTracker>,
}

impl DrainLayer {
    /// Creates a new layer feeding `tracker`
    #[must_use]
    pub const fn new(tracker: Arc<RequestTracker>) -> Self {
        Self { tracker }
    }
}

impl<S> Layer<S> for DrainLayer {
    type Service = DrainService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DrainService::new(inner, Arc::clone(&self.tracker))
    }
}

/// A service that registers each call with a [`RequestTracker`]
#[derive(Debug, Clone)]
pub struct DrainService<S> {
    inner: S,
    tracker: Arc<RequestTracker>,
}

impl<S> DrainService<S> {
    /// Creates a new tracking service
    #[must_use]
    pub const fn new(inner: S, tracker: Arc<RequestTracker>) -> Self {
        Self { inner, tracker }
    }

    /// Returns a reference to the inner service.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Consumes the wrapper, returning the inner service.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Request> Service<Request> for DrainService<S>
where
    S: Service<Request>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TrackedFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let guard = self.tracker.track();
        TrackedFuture::new(self.inner.call(req), guard)
    }
}

pin_project! {
    /// Future that holds a request registration until it resolves
    #[derive(Debug)]
    pub struct TrackedFuture<F> {
        #[pin]
        future: F,
        guard: Option<RequestGuard>,
    }
}

impl<F> TrackedFuture<F> {
    /// Wrap `future`, releasing `guard` when it completes or is dropped
    pub fn new(future: F, guard: RequestGuard) -> Self {
        Self {
            future,
            guard: Some(guard),
        }
    }

    /// Id of the tracked request, until the future has completed
    pub fn request_id(&self) -> Option<RequestId> {
        self.guard.as_ref().map(RequestGuard::id)
    }
}

impl<F: Future> Future for TrackedFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = ready!(this.future.poll(cx));
        this.guard.take();
        Poll::Ready(output)
    }
}
