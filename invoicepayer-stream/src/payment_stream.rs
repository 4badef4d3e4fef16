// One payment hash's live monitoring session.
//
// A stream owns four background tasks (poller, keepalive, retry hint, idle
// reaper) which share nothing but the closed token and the broadcaster
// channel. Every broadcast goes through `emit`, which checks the token and
// broadcasts under the same gate that `close` and `try_reap` take, so once a
// stream is closed no task can publish another event.

use chrono::{DateTime, Utc};
use invoicepayer_core::config::StreamConfig;
use invoicepayer_core::{PaymentBackend, PaymentHash};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, Instrument};

use crate::broadcaster::{Broadcaster, ChannelId, StreamEvent};
use crate::poller::{PollOutcome, StatusPoller};
use crate::registry::{ManagedStream, StreamRegistry};

/// Timer settings shared by all streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub keepalive_interval: Duration,
    pub retry_hint_delay: Duration,
    pub retry_hint: Duration,
    pub reaper_interval: Duration,
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval(),
            retry_hint_delay: config.retry_hint_delay(),
            retry_hint: config.retry_hint(),
            reaper_interval: config.reaper_interval(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

/// Serializable view of a stream for the status API
#[derive(Debug, Clone, Serialize)]
pub struct StreamSnapshot {
    pub payment_hash: PaymentHash,
    pub observers: usize,
    pub created_at: DateTime<Utc>,
    pub outcome: Option<&'static str>,
}

pub struct PaymentStream {
    payment_hash: PaymentHash,
    channel: ChannelId,
    broadcaster: Arc<dyn Broadcaster>,
    closed: CancellationToken,
    /// Serializes broadcasts against closing
    gate: Mutex<()>,
    created_at: DateTime<Utc>,
    closed_at: Mutex<Option<DateTime<Utc>>>,
    outcome: Mutex<Option<PollOutcome>>,
}

impl PaymentStream {
    /// Create a stream with its own broadcaster channel. Nothing runs until
    /// [`PaymentStream::start`].
    pub fn new(payment_hash: PaymentHash, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let channel = broadcaster.open();
        Self {
            payment_hash,
            channel,
            broadcaster,
            closed: CancellationToken::new(),
            gate: Mutex::new(()),
            created_at: Utc::now(),
            closed_at: Mutex::new(None),
            outcome: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn payment_hash(&self) -> &PaymentHash {
        &self.payment_hash
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        *self.closed_at.lock()
    }

    /// How the poller finished, once it has.
    #[must_use]
    pub fn outcome(&self) -> Option<PollOutcome> {
        self.outcome.lock().clone()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count(self.channel)
    }

    /// Resolves when the stream closes.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    #[must_use]
    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            payment_hash: self.payment_hash.clone(),
            observers: self.observer_count(),
            created_at: self.created_at,
            outcome: self.outcome.lock().as_ref().map(PollOutcome::label),
        }
    }

    /// Publish one event. Returns false, without publishing, once closed.
    pub fn emit(&self, event: StreamEvent) -> bool {
        let _gate = self.gate.lock();
        if self.closed.is_cancelled() {
            return false;
        }
        self.broadcaster.broadcast(self.channel, event);
        true
    }

    /// Close unconditionally: stop all tasks, release the channel and drop
    /// the registry mapping. Returns false if the stream was already closed.
    pub fn close(self: &Arc<Self>, registry: &StreamRegistry<Self>) -> bool {
        {
            let _gate = self.gate.lock();
            if self.closed.is_cancelled() {
                return false;
            }
            self.mark_closed();
            self.broadcaster.release(self.channel);
        }
        registry.remove(&self.payment_hash, self);
        info!(payment_hash = %self.payment_hash, "Stream closed");
        true
    }

    /// Close only if no observer is attached. The observer check and the
    /// channel release happen in one broadcaster step, so an observer either
    /// subscribed in time and keeps the stream alive, or is refused and
    /// re-attaches to a fresh stream.
    pub fn try_reap(self: &Arc<Self>, registry: &StreamRegistry<Self>) -> bool {
        {
            let _gate = self.gate.lock();
            if self.closed.is_cancelled() {
                return true;
            }
            if !self.broadcaster.release_if_idle(self.channel) {
                return false;
            }
            self.mark_closed();
        }
        registry.remove(&self.payment_hash, self);
        info!(payment_hash = %self.payment_hash, "Idle stream reclaimed");
        true
    }

    fn mark_closed(&self) {
        self.closed.cancel();
        *self.closed_at.lock() = Some(Utc::now());
    }

    /// Spawn the stream's background tasks on `tasks`.
    pub fn start(
        self: &Arc<Self>,
        backend: Arc<dyn PaymentBackend>,
        registry: Arc<StreamRegistry<Self>>,
        settings: StreamSettings,
        tasks: &TaskTracker,
    ) {
        let span = info_span!(
            "payment_stream",
            payment_hash = %self.payment_hash,
            channel = self.channel
        );
        debug!(parent: &span, "Starting stream tasks");

        tasks.spawn(
            Self::poll(Arc::clone(self), backend, Arc::clone(&registry)).instrument(span.clone()),
        );
        tasks.spawn(
            Self::keepalive(Arc::clone(self), settings.keepalive_interval)
                .instrument(span.clone()),
        );
        tasks.spawn(
            Self::retry_hint(Arc::clone(self), settings.retry_hint_delay, settings.retry_hint)
                .instrument(span.clone()),
        );
        tasks.spawn(
            Self::reap_when_idle(Arc::clone(self), registry, settings.reaper_interval)
                .instrument(span),
        );
    }

    async fn poll(
        stream: Arc<Self>,
        backend: Arc<dyn PaymentBackend>,
        registry: Arc<StreamRegistry<Self>>,
    ) {
        let poller = StatusPoller::new(backend, stream.payment_hash.clone(), stream.closed.clone());
        let outcome = poller.run(|event| stream.emit(event)).await;
        debug!(outcome = outcome.label(), "Poller finished");

        let errored = matches!(outcome, PollOutcome::Errored(_));
        if outcome != PollOutcome::Cancelled {
            *stream.outcome.lock() = Some(outcome);
        }
        if errored {
            stream.close(&registry);
        }
    }

    async fn keepalive(stream: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = stream.closed.cancelled() => break,
                _ = ticker.tick() => {
                    if !stream.emit(StreamEvent::Keepalive) {
                        break;
                    }
                }
            }
        }
    }

    async fn retry_hint(stream: Arc<Self>, delay: Duration, hint: Duration) {
        tokio::select! {
            biased;
            () = stream.closed.cancelled() => {}
            () = tokio::time::sleep(delay) => {
                stream.emit(StreamEvent::Retry(hint));
            }
        }
    }

    async fn reap_when_idle(
        stream: Arc<Self>,
        registry: Arc<StreamRegistry<Self>>,
        period: Duration,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = stream.closed.cancelled() => break,
                _ = ticker.tick() => {
                    if stream.try_reap(&registry) {
                        break;
                    }
                    debug!(observers = stream.observer_count(), "Stream still observed");
                }
            }
        }
    }
}

impl ManagedStream for PaymentStream {
    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventHub;
    use invoicepayer_core::PaymentStatus;

    const HASH: &str = "abababababababababababababababababababababababababababababababab";

    fn fixture() -> (EventHub, Arc<StreamRegistry<PaymentStream>>, Arc<PaymentStream>) {
        let hub = EventHub::new();
        let registry = Arc::new(StreamRegistry::new());
        let hash = PaymentHash::parse(HASH).unwrap();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(hub.clone());
        let stream = registry
            .get_or_create(&hash, || PaymentStream::new(hash.clone(), broadcaster))
            .into_stream();
        (hub, registry, stream)
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribers_until_closed() {
        let (hub, registry, stream) = fixture();
        let mut sub = hub.subscribe(stream.channel()).unwrap();

        assert!(stream.emit(StreamEvent::Status(PaymentStatus::Pending)));
        assert!(stream.close(&registry));
        assert!(!stream.emit(StreamEvent::Keepalive));

        assert_eq!(
            sub.recv().await,
            Some(StreamEvent::Status(PaymentStatus::Pending))
        );
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_close_is_idempotent_and_unmaps() {
        let (hub, registry, stream) = fixture();
        assert!(stream.close(&registry));
        assert!(!stream.close(&registry));

        assert!(stream.is_closed());
        assert!(stream.closed_at().is_some());
        assert!(registry.is_empty());
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_try_reap_keeps_observed_stream() {
        let (hub, registry, stream) = fixture();
        let sub = hub.subscribe(stream.channel()).unwrap();

        assert!(!stream.try_reap(&registry));
        assert!(!stream.is_closed());
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(stream.try_reap(&registry));
        assert!(stream.is_closed());
        assert!(registry.is_empty());
        assert!(hub.subscribe(stream.channel()).is_none());
    }

    #[test]
    fn test_snapshot_reports_observers() {
        let (hub, _registry, stream) = fixture();
        let _a = hub.subscribe(stream.channel()).unwrap();
        let _b = hub.subscribe(stream.channel()).unwrap();

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.payment_hash.as_str(), HASH);
        assert_eq!(snapshot.observers, 2);
        assert_eq!(snapshot.outcome, None);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = StreamSettings::default();
        assert_eq!(settings.keepalive_interval, Duration::from_secs(25));
        assert_eq!(settings.retry_hint_delay, Duration::from_secs(1));
        assert_eq!(settings.retry_hint, Duration::from_secs(3));
        assert_eq!(settings.reaper_interval, Duration::from_secs(120));
    }
}
