//! Common test utilities shared by the drain coordinator tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use drainwatch::scheduler::{RepeatingTask, Task};
use drainwatch::{
    DrainConfigBuilder, DrainCoordinator, DrainError, DrainResult, Listener, RequestTracker,
    Scheduler, TimerHandle, TokioScheduler,
};

/// Listener that records stop calls and completes immediately
#[derive(Debug, Default)]
pub struct CountingListener {
    stops: AtomicUsize,
    fail: bool,
}

impl CountingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener whose stop call reports an error
    pub fn failing() -> Self {
        Self {
            stops: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Listener for CountingListener {
    async fn stop_listening(&self) -> DrainResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DrainError::listener("socket already gone"));
        }
        Ok(())
    }
}

/// Scheduler wrapper counting how often repeating tasks run
#[derive(Debug)]
pub struct CountingScheduler {
    inner: TokioScheduler,
    poll_runs: Arc<AtomicUsize>,
}

impl CountingScheduler {
    pub fn new() -> Self {
        Self {
            inner: TokioScheduler::without_signals(),
            poll_runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn poll_runs(&self) -> usize {
        self.poll_runs.load(Ordering::SeqCst)
    }
}

impl Scheduler for CountingScheduler {
    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        self.inner.after(delay, task)
    }

    fn every(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        let runs = Arc::clone(&self.poll_runs);
        self.inner.every(
            period,
            Box::new(move || -> ControlFlow<()> {
                runs.fetch_add(1, Ordering::SeqCst);
                task()
            }),
        )
    }

    fn on_shutdown_requested(&self, callback: Task) {
        self.inner.on_shutdown_requested(callback);
    }
}

/// Coordinator wired to a fresh tracker and a [`CountingListener`]
pub fn test_coordinator(
    timeout: Duration,
    poll_interval: Duration,
) -> (Arc<DrainCoordinator>, Arc<RequestTracker>, Arc<CountingListener>) {
    let tracker = Arc::new(RequestTracker::new());
    let listener = Arc::new(CountingListener::new());
    let config = DrainConfigBuilder::new(timeout)
        .poll_interval(poll_interval)
        .build()
        .expect("valid test config");
    let coordinator = DrainCoordinator::new(
        config,
        Arc::clone(&tracker),
        listener.clone(),
        Arc::new(TokioScheduler::without_signals()),
    )
    .expect("coordinator");
    (Arc::new(coordinator), tracker, listener)
}

/// Drop `guard` after `after` has elapsed
pub fn finish_after(guard: drainwatch::RequestGuard, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        drop(guard);
    });
}

/// One captured tracing event
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub level: tracing::Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Layer collecting every event emitted while it is the default subscriber
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<parking_lot::Mutex<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Install as the thread's default subscriber until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::prelude::*;
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }
}

struct FieldVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventRecorder {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut FieldVisitor {
            message: &mut message,
            fields: &mut fields,
        });
        self.events.lock().push(RecordedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}
