// In-memory event hub.
//
// One channel per payment stream. Observers hold an unbounded receiver each;
// a send that fails means the observer is gone and it is pruned. Channels
// keep a short history so late observers start from the current state.

use dashmap::DashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broadcaster::{Broadcaster, ChannelId, StreamEvent};

/// Identifies one observer within a channel
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    sender: mpsc::UnboundedSender<StreamEvent>,
}

#[derive(Default)]
struct Channel {
    /// Replayed to late subscribers. Holds at most one copy of each
    /// distinct event, so a long-pending payment does not grow it.
    history: Vec<StreamEvent>,
    subscribers: Vec<Subscriber>,
}

impl Channel {
    fn record(&mut self, event: &StreamEvent) {
        if !event.is_replayable() {
            return;
        }
        let kind = mem::discriminant(event);
        let latest = self
            .history
            .iter()
            .rev()
            .find(|seen| mem::discriminant(*seen) == kind);
        if latest != Some(event) {
            self.history.push(event.clone());
        }
    }

    fn live_subscribers(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|sub| !sub.sender.is_closed())
            .count()
    }
}

#[derive(Default)]
struct HubInner {
    channels: DashMap<ChannelId, Channel>,
    next_channel: AtomicU64,
    next_subscriber: AtomicU64,
}

/// In-memory hub routing stream events to connected observers.
///
/// Each payment stream owns one channel. Subscribing replays the channel's
/// history so an observer arriving mid-stream sees the same sequence as
/// one that was attached from the start.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer. Returns `None` once the channel was released.
    pub fn subscribe(&self, channel: ChannelId) -> Option<Subscription> {
        let mut entry = self.inner.channels.get_mut(&channel)?;
        let (tx, rx) = mpsc::unbounded_channel();

        for event in &entry.history {
            // Receiver is in hand, cannot be closed yet
            let _ = tx.send(event.clone());
        }

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        entry.subscribers.push(Subscriber { id, sender: tx });
        debug!(
            channel,
            subscriber = id,
            observers = entry.subscribers.len(),
            "Observer attached"
        );

        Some(Subscription {
            channel,
            id,
            receiver: rx,
            hub: self.clone(),
        })
    }

    fn unsubscribe(&self, channel: ChannelId, id: SubscriberId) {
        if let Some(mut entry) = self.inner.channels.get_mut(&channel) {
            entry.subscribers.retain(|sub| sub.id != id);
            debug!(
                channel,
                subscriber = id,
                observers = entry.subscribers.len(),
                "Observer detached"
            );
        }
    }

    /// Number of channels not yet released
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }
}

impl Broadcaster for EventHub {
    fn open(&self) -> ChannelId {
        let channel = self.inner.next_channel.fetch_add(1, Ordering::Relaxed);
        self.inner.channels.insert(channel, Channel::default());
        channel
    }

    fn broadcast(&self, channel: ChannelId, event: StreamEvent) -> usize {
        let Some(mut entry) = self.inner.channels.get_mut(&channel) else {
            warn!(channel, event = event.name(), "Broadcast to released channel dropped");
            return 0;
        };

        entry.record(&event);

        let before = entry.subscribers.len();
        entry
            .subscribers
            .retain(|sub| sub.sender.send(event.clone()).is_ok());
        let sent = entry.subscribers.len();

        if sent < before {
            debug!(channel, dropped = before - sent, "Pruned disconnected observers");
        }
        sent
    }

    fn observer_count(&self, channel: ChannelId) -> usize {
        self.inner
            .channels
            .get(&channel)
            .map_or(0, |entry| entry.live_subscribers())
    }

    fn release_if_idle(&self, channel: ChannelId) -> bool {
        if self
            .inner
            .channels
            .remove_if(&channel, |_, entry| entry.live_subscribers() == 0)
            .is_some()
        {
            debug!(channel, "Idle channel released");
            return true;
        }
        !self.inner.channels.contains_key(&channel)
    }

    fn release(&self, channel: ChannelId) {
        if let Some((_, entry)) = self.inner.channels.remove(&channel) {
            debug!(
                channel,
                observers = entry.subscribers.len(),
                "Channel released"
            );
        }
    }
}

/// One observer's feed. Detaches from the hub when dropped.
pub struct Subscription {
    channel: ChannelId,
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
    hub: EventHub,
}

impl Subscription {
    /// Next event, or `None` once the channel was released and drained.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.channel, self.id);
    }
}
