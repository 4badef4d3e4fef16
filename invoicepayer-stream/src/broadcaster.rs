//! Transport-facing fan-out interface
//!
//! A payment stream never sees its observers. It gets a channel from the
//! broadcaster when it is created and from then on only publishes events,
//! asks how many observers are listening, and releases the channel.

use invoicepayer_core::PaymentStatus;
use serde_json::Value;
use std::time::Duration;

/// Identifies one stream's channel. Never reused within a process.
pub type ChannelId = u64;

/// Event delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(PaymentStatus),
    /// Full payment record, only after `complete`
    Result(Value),
    Keepalive,
    /// Reconnect delay directive (SSE `retry:`)
    Retry(Duration),
}

impl StreamEvent {
    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Result(_) => "result",
            Self::Keepalive => "keepalive",
            Self::Retry(_) => "retry",
        }
    }

    /// Keepalives only matter to the connection they were sent on.
    #[must_use]
    pub const fn is_replayable(&self) -> bool {
        !matches!(self, Self::Keepalive)
    }
}

/// Delivers events to every observer attached to a channel.
pub trait Broadcaster: Send + Sync {
    /// Allocate a channel for a new stream.
    fn open(&self) -> ChannelId;

    /// Deliver `event` to all observers of `channel`, returning how many
    /// received it. Unknown channels are ignored.
    fn broadcast(&self, channel: ChannelId, event: StreamEvent) -> usize;

    /// Number of observers currently attached.
    fn observer_count(&self, channel: ChannelId) -> usize;

    /// Release the channel if no observer is attached, in one step with
    /// respect to new subscriptions. Returns true when the channel is gone.
    fn release_if_idle(&self, channel: ChannelId) -> bool;

    /// Release the channel unconditionally. Attached observers still drain
    /// what was already delivered, then their feed ends.
    fn release(&self, channel: ChannelId);
}
