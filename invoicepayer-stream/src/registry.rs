// Stream registry keyed by payment hash.
//
// Creation happens inside the map's entry lock, so concurrent first
// attaches for one hash converge on a single stream. Streams that have
// already closed are treated as absent and replaced.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use invoicepayer_core::PaymentHash;
use std::sync::Arc;

/// Trait for streams held by [`StreamRegistry`].
pub trait ManagedStream: Send + Sync + 'static {
    fn is_closed(&self) -> bool;
}

/// Result of [`StreamRegistry::get_or_create`].
pub enum Lookup<S> {
    Existing(Arc<S>),
    /// The factory ran for this caller; it is responsible for starting the stream
    Created(Arc<S>),
}

impl<S> Lookup<S> {
    #[must_use]
    pub const fn stream(&self) -> &Arc<S> {
        match self {
            Self::Existing(stream) | Self::Created(stream) => stream,
        }
    }

    #[must_use]
    pub fn into_stream(self) -> Arc<S> {
        match self {
            Self::Existing(stream) | Self::Created(stream) => stream,
        }
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

pub struct StreamRegistry<S: ManagedStream> {
    streams: DashMap<PaymentHash, Arc<S>>,
}

impl<S: ManagedStream> StreamRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
        }
    }

    /// Return the open stream for `key`, or build one with `factory`.
    ///
    /// `factory` runs at most once per stream instance, under the entry
    /// lock, so it must not touch this registry.
    pub fn get_or_create<F>(&self, key: &PaymentHash, factory: F) -> Lookup<S>
    where
        F: FnOnce() -> S,
    {
        match self.streams.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_closed() {
                    return Lookup::Existing(Arc::clone(occupied.get()));
                }
                let stream = Arc::new(factory());
                occupied.insert(Arc::clone(&stream));
                Lookup::Created(stream)
            }
            Entry::Vacant(vacant) => {
                let stream = Arc::new(factory());
                vacant.insert(Arc::clone(&stream));
                Lookup::Created(stream)
            }
        }
    }

    /// Remove the mapping only if it still points at `stream`.
    pub fn remove(&self, key: &PaymentHash, stream: &Arc<S>) -> bool {
        self.streams
            .remove_if(key, |_, current| Arc::ptr_eq(current, stream))
            .is_some()
    }

    #[must_use]
    pub fn get(&self, key: &PaymentHash) -> Option<Arc<S>> {
        self.streams.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Point-in-time copy of all mapped streams.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(PaymentHash, Arc<S>)> {
        self.streams
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl<S: ManagedStream> Default for StreamRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
