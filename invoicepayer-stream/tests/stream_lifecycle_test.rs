//! Stream lifecycle tests against a scripted backend, on paused time.

use async_trait::async_trait;
use invoicepayer_core::{
    AttemptStatus, Error, PaymentAttempt, PaymentBackend, PaymentHash, PaymentStatus, Result,
    WaitResponse,
};
use invoicepayer_stream::{
    PaymentStreamManager, PollOutcome, StreamEvent, StreamSettings, Subscription,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Backend whose long-poll answers are pushed by the test. A wait call
/// with nothing queued blocks until an answer arrives.
#[derive(Default)]
struct ScriptedBackend {
    waits: Mutex<VecDeque<Result<WaitResponse>>>,
    listings: Mutex<VecDeque<Result<Vec<PaymentAttempt>>>>,
    answered: Notify,
    wait_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn push_wait(&self, response: Result<WaitResponse>) {
        self.waits.lock().push_back(response);
        self.answered.notify_one();
    }

    fn push_status(&self, status: AttemptStatus, record: Value) {
        self.push_wait(Ok(WaitResponse { status, record }));
    }

    fn push_listing(&self, attempts: Vec<PaymentAttempt>) {
        self.listings.lock().push_back(Ok(attempts));
    }

    fn wait_calls(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentBackend for ScriptedBackend {
    async fn wait_for_status(&self, _: &PaymentHash) -> Result<WaitResponse> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        loop {
            let answered = self.answered.notified();
            let next = self.waits.lock().pop_front();
            if let Some(response) = next {
                return response;
            }
            answered.await;
        }
    }

    async fn list_attempts(&self, _: &PaymentHash) -> Result<Vec<PaymentAttempt>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.listings.lock().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn pay(&self, _: &str) -> Result<Value> {
        Ok(Value::Null)
    }
}

fn setup() -> (Arc<ScriptedBackend>, PaymentStreamManager, PaymentHash) {
    let backend = Arc::new(ScriptedBackend::default());
    let manager = PaymentStreamManager::new(backend.clone(), StreamSettings::default());
    (backend, manager, PaymentHash::parse(HASH).unwrap())
}

/// Let every runnable task make progress.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Next status or result event, skipping timer events.
async fn next_app_event(sub: &mut Subscription) -> Option<StreamEvent> {
    loop {
        match sub.recv().await? {
            StreamEvent::Keepalive | StreamEvent::Retry(_) => {}
            event => return Some(event),
        }
    }
}

async fn app_events(sub: &mut Subscription, count: usize) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(next_app_event(sub).await.expect("feed ended early"));
    }
    events
}

fn status(s: PaymentStatus) -> StreamEvent {
    StreamEvent::Status(s)
}

fn attempt(status: AttemptStatus, partid: u64) -> PaymentAttempt {
    PaymentAttempt {
        status,
        record: json!({"partid": partid}),
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_attach_creates_one_stream() {
    let (backend, manager, hash) = setup();

    let attaches = (0..16).map(|_| manager.attach(&hash));
    let subs = futures::future::join_all(attaches).await;
    settle().await;

    assert_eq!(subs.len(), 16);
    assert_eq!(manager.active_streams(), 1);
    assert_eq!(manager.observer_total(), 16);
    assert!(subs.iter().all(|s| s.channel() == subs[0].channel()));
    assert_eq!(backend.wait_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pending_pending_complete_sequence() {
    let (backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;

    let record = json!({"status": "complete", "payment_preimage": "aa"});
    backend.push_wait(Ok(WaitResponse::pending()));
    backend.push_wait(Ok(WaitResponse::pending()));
    backend.push_status(AttemptStatus::Complete, record.clone());

    assert_eq!(
        app_events(&mut sub, 6).await,
        vec![
            status(PaymentStatus::Connecting),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Complete),
            StreamEvent::Result(record.clone()),
        ]
    );

    settle().await;
    assert_eq!(backend.wait_calls(), 3);
    let stream = manager.stream(&hash).unwrap();
    assert_eq!(stream.outcome(), Some(PollOutcome::Complete(record)));
}

#[tokio::test(start_paused = true)]
async fn test_observers_share_sequence_and_late_observer_replays() {
    let (backend, manager, hash) = setup();
    let mut first = manager.attach(&hash).await;
    let mut second = manager.attach(&hash).await;

    backend.push_status(AttemptStatus::Complete, json!({"ok": true}));
    let a = app_events(&mut first, 4).await;
    let b = app_events(&mut second, 4).await;
    assert_eq!(a, b);

    let mut late = manager.attach(&hash).await;
    assert_eq!(app_events(&mut late, 4).await, a);
    assert_eq!(backend.wait_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_with_pending_sibling_continues() {
    let (backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;

    backend.push_listing(vec![
        attempt(AttemptStatus::Pending, 1),
        attempt(AttemptStatus::Failed, 2),
    ]);
    backend.push_status(AttemptStatus::Failed, json!({"partid": 2}));

    assert_eq!(
        app_events(&mut sub, 3).await,
        vec![
            status(PaymentStatus::Connecting),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Pending),
        ]
    );

    settle().await;
    assert_eq!(backend.list_calls(), 1);
    assert_eq!(backend.wait_calls(), 2);
    assert_eq!(manager.stream(&hash).unwrap().outcome(), None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_without_pending_sibling_stops() {
    let (backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;

    backend.push_listing(vec![
        attempt(AttemptStatus::Failed, 1),
        attempt(AttemptStatus::Failed, 2),
    ]);
    backend.push_status(AttemptStatus::Failed, json!({"partid": 2}));

    assert_eq!(
        app_events(&mut sub, 3).await,
        vec![
            status(PaymentStatus::Connecting),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Failed),
        ]
    );

    // No result event follows a failure
    let more = tokio::time::timeout(Duration::from_secs(60), next_app_event(&mut sub)).await;
    assert!(more.is_err());
    assert_eq!(backend.wait_calls(), 1);

    let stream = manager.stream(&hash).unwrap();
    assert_eq!(
        stream.outcome(),
        Some(PollOutcome::Failed(Some(json!({"partid": 2}))))
    );
}

#[tokio::test(start_paused = true)]
async fn test_backend_error_emits_one_error_and_closes() {
    let (backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;
    let stream = manager.stream(&hash).unwrap();

    backend.push_wait(Err(Error::Backend("connection refused".to_string())));

    assert_eq!(
        app_events(&mut sub, 3).await,
        vec![
            status(PaymentStatus::Connecting),
            status(PaymentStatus::Pending),
            status(PaymentStatus::Error(
                "Backend error: connection refused".to_string()
            )),
        ]
    );
    // Feed ends once the buffered events are drained
    assert_eq!(next_app_event(&mut sub).await, None);

    assert!(stream.closed_at().is_some());
    assert_eq!(manager.active_streams(), 0);
    assert!(matches!(stream.outcome(), Some(PollOutcome::Errored(_))));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(backend.wait_calls(), 1);
    assert_eq!(backend.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_and_retry_hint() {
    let (_backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;

    let mut timers = Vec::new();
    while timers.len() < 2 {
        match sub.recv().await.unwrap() {
            event @ (StreamEvent::Keepalive | StreamEvent::Retry(_)) => timers.push(event),
            _ => {}
        }
    }
    assert_eq!(
        timers,
        vec![
            StreamEvent::Retry(Duration::from_secs(3)),
            StreamEvent::Keepalive,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_stream_reclaimed_then_recreated() {
    let (backend, manager, hash) = setup();
    let sub = manager.attach(&hash).await;
    settle().await;
    let first = manager.stream(&hash).unwrap();

    drop(sub);
    tokio::time::sleep(Duration::from_secs(121)).await;

    assert!(first.closed_at().is_some());
    assert_eq!(manager.active_streams(), 0);

    let mut fresh = manager.attach(&hash).await;
    let second = manager.stream(&hash).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.channel(), second.channel());
    assert_eq!(
        next_app_event(&mut fresh).await,
        Some(status(PaymentStatus::Connecting))
    );

    settle().await;
    assert_eq!(backend.wait_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_observed_stream_not_reclaimed() {
    let (_backend, manager, hash) = setup();
    let _sub = manager.attach(&hash).await;

    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(manager.active_streams(), 1);
    assert!(manager.stream(&hash).unwrap().closed_at().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_nothing_broadcast_after_close() {
    let (backend, manager, hash) = setup();
    let mut sub = manager.attach(&hash).await;
    settle().await;
    let stream = manager.stream(&hash).unwrap();

    manager.shutdown(Duration::from_secs(1)).await;
    assert!(stream.closed_at().is_some());

    // Late backend answers and timer firings must stay invisible
    backend.push_status(AttemptStatus::Complete, json!({}));
    tokio::time::sleep(Duration::from_secs(300)).await;

    let mut seen = Vec::new();
    while let Some(event) = sub.recv().await {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            status(PaymentStatus::Connecting),
            status(PaymentStatus::Pending),
        ]
    );
    assert_eq!(backend.wait_calls(), 1);
    assert_eq!(stream.outcome(), None);
}
