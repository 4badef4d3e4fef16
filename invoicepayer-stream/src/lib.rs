//! Live payment status streams
//!
//! One [`PaymentStream`] per payment hash, shared by every observer that
//! attaches to it through [`PaymentStreamManager::attach`]. The stream polls
//! the [`PaymentBackend`](invoicepayer_core::PaymentBackend) until the payment
//! settles, fans each status out through the [`Broadcaster`], keeps idle
//! connections alive and is reclaimed once nobody is watching.

pub mod broadcaster;
pub mod hub;
pub mod manager;
pub mod payment_stream;
pub mod poller;
pub mod registry;
pub mod submission;

pub use broadcaster::{Broadcaster, ChannelId, StreamEvent};
pub use hub::{EventHub, Subscription};
pub use manager::PaymentStreamManager;
pub use payment_stream::{PaymentStream, StreamSettings, StreamSnapshot};
pub use poller::{PollOutcome, StatusPoller};
pub use registry::{Lookup, ManagedStream, StreamRegistry};
pub use submission::PaymentSubmitter;
