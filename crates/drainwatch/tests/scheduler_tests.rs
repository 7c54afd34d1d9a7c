//! Scheduler and listener boundary tests

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, sleep};

use drainwatch::{CompletionSignal, Listener, ListenerGate, Scheduler, TokioScheduler};

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&count), count)
}

// ============================================================================
// TokioScheduler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_after_runs_once_at_delay() {
    let scheduler = TokioScheduler::without_signals();
    let fired = CompletionSignal::new();
    let start = Instant::now();

    let signal = fired.clone();
    let _handle = scheduler.after(
        Duration::from_secs(3),
        Box::new(move || {
            signal.resolve(Instant::now());
        }),
    );

    let at = fired.wait().await;
    assert_eq!(at - start, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_zero_delay_never_runs_inline() {
    let scheduler = TokioScheduler::without_signals();
    let (count, seen) = counter();

    let _handle = scheduler.after(
        Duration::ZERO,
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_does_not_fire() {
    let scheduler = TokioScheduler::without_signals();
    let (count, seen) = counter();

    let handle = scheduler.after(
        Duration::from_secs(1),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );
    handle.cancel();
    assert!(handle.is_cancelled());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_every_repeats_until_break() {
    let scheduler = TokioScheduler::without_signals();
    let (count, seen) = counter();

    let _handle = scheduler.every(
        Duration::from_secs(2),
        Box::new(move || {
            if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }),
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    sleep(Duration::from_secs(4)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    sleep(Duration::from_secs(20)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_every_stops_when_cancelled() {
    let scheduler = TokioScheduler::without_signals();
    let (count, seen) = counter();

    let handle = scheduler.every(
        Duration::from_secs(1),
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }),
    );

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    handle.cancel();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_shutdown_request_fires_each_subscriber_once() {
    let scheduler = TokioScheduler::without_signals();
    let (count, seen) = counter();

    for _ in 0..2 {
        let count = Arc::clone(&count);
        scheduler.on_shutdown_requested(Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));
    }

    sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    scheduler.request_shutdown();
    scheduler.request_shutdown();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

// ============================================================================
// ListenerGate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_gate_stop_waits_for_accept_loop() {
    let gate = ListenerGate::new();
    let accept_loop = tokio::spawn({
        let gate = gate.clone();
        async move {
            gate.stopped().await;
            sleep(Duration::from_secs(2)).await;
            gate.mark_closed();
        }
    });

    assert!(!gate.is_stopping());
    let start = Instant::now();
    gate.stop_listening().await.unwrap();

    assert!(gate.is_stopping());
    assert!(gate.is_closed());
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    accept_loop.await.unwrap();
}

#[tokio::test]
async fn test_gate_already_closed_stops_immediately() {
    let gate = ListenerGate::new();
    gate.mark_closed();
    gate.mark_closed();

    gate.stop_listening().await.unwrap();
    gate.stop_listening().await.unwrap();
    assert!(gate.is_closed());
}
