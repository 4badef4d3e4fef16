use invoicepayer_core::{PaymentBackend, PaymentHash};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;
use crate::hub::{EventHub, Subscription};
use crate::payment_stream::{PaymentStream, StreamSettings, StreamSnapshot};
use crate::registry::StreamRegistry;

/// Entry point for observers: owns the registry, the event hub and every
/// stream task.
#[derive(Clone)]
pub struct PaymentStreamManager {
    registry: Arc<StreamRegistry<PaymentStream>>,
    hub: EventHub,
    broadcaster: Arc<dyn Broadcaster>,
    backend: Arc<dyn PaymentBackend>,
    settings: StreamSettings,
    tasks: TaskTracker,
}

impl PaymentStreamManager {
    pub fn new(backend: Arc<dyn PaymentBackend>, settings: StreamSettings) -> Self {
        let hub = EventHub::new();
        Self {
            registry: Arc::new(StreamRegistry::new()),
            broadcaster: Arc::new(hub.clone()),
            hub,
            backend,
            settings,
            tasks: TaskTracker::new(),
        }
    }

    /// Attach an observer to the stream for `payment_hash`, creating and
    /// starting the stream if none is open.
    pub async fn attach(&self, payment_hash: &PaymentHash) -> Subscription {
        loop {
            let lookup = self.registry.get_or_create(payment_hash, || {
                PaymentStream::new(payment_hash.clone(), Arc::clone(&self.broadcaster))
            });

            if lookup.is_created() {
                info!(payment_hash = %payment_hash, "Creating payment stream");
                lookup.stream().start(
                    Arc::clone(&self.backend),
                    Arc::clone(&self.registry),
                    self.settings,
                    &self.tasks,
                );
            }

            let stream = lookup.into_stream();
            if let Some(subscription) = self.hub.subscribe(stream.channel()) {
                debug!(
                    payment_hash = %payment_hash,
                    observers = stream.observer_count(),
                    "Observer joined stream"
                );
                return subscription;
            }

            // Released between lookup and subscribe; the closed stream is
            // replaced on the next lookup
            tokio::task::yield_now().await;
        }
    }

    /// Tracker every stream task runs on. Shutdown waits on it, so other
    /// background work that should drain with the streams belongs here too.
    #[must_use]
    pub const fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    #[must_use]
    pub fn stream(&self, payment_hash: &PaymentHash) -> Option<Arc<PaymentStream>> {
        self.registry.get(payment_hash)
    }

    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn observer_total(&self) -> usize {
        self.registry
            .snapshot()
            .iter()
            .map(|(_, stream)| stream.observer_count())
            .sum()
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<StreamSnapshot> {
        self.registry
            .snapshot()
            .iter()
            .map(|(_, stream)| stream.snapshot())
            .collect()
    }

    /// Close every stream and wait up to `timeout` for the tracked tasks,
    /// in-flight payments included.
    pub async fn shutdown(&self, timeout: Duration) {
        let streams = self.registry.snapshot();
        info!(streams = streams.len(), "Closing payment streams");
        for (_, stream) in &streams {
            stream.close(&self.registry);
        }

        self.tasks.close();
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                "Background tasks did not finish before shutdown timeout"
            );
        }
    }
}
