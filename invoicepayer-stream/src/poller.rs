// Status poller: drives one payment to a terminal status.
//
// connecting -> pending -> (long-poll the backend until the answer is no
// longer pending) -> complete + result | failed | error.
//
// A `failed` answer only describes one attempt, so it is re-checked
// against the full attempt list: while any sibling attempt is still in
// flight the payment counts as pending and polling goes on. There is no
// cap on that cycle.

use invoicepayer_core::{
    AttemptStatus, Error, PaymentAttempt, PaymentBackend, PaymentHash, PaymentStatus,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcaster::StreamEvent;

/// How a poll run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Complete(Value),
    /// Last settled attempt, if the backend listed any
    Failed(Option<Value>),
    /// A backend call failed; the stream must close
    Errored(String),
    /// The stream closed underneath the poller
    Cancelled,
}

impl PollOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Complete(_) => "complete",
            Self::Failed(_) => "failed",
            Self::Errored(_) => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

enum Recheck {
    StillPending,
    Settled(Option<Value>),
}

/// Decide what a `failed` answer means given every attempt for the hash.
fn recheck(attempts: Vec<PaymentAttempt>) -> Recheck {
    if attempts.iter().any(|a| a.status == AttemptStatus::Pending) {
        return Recheck::StillPending;
    }
    Recheck::Settled(attempts.into_iter().last().map(|a| a.record))
}

pub struct StatusPoller {
    backend: Arc<dyn PaymentBackend>,
    payment_hash: PaymentHash,
    closed: CancellationToken,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn PaymentBackend>,
        payment_hash: PaymentHash,
        closed: CancellationToken,
    ) -> Self {
        Self {
            backend,
            payment_hash,
            closed,
        }
    }

    /// Run to completion. `emit` publishes one event and returns false once
    /// the stream is closed, which stops the run without further calls.
    pub async fn run<F>(&self, mut emit: F) -> PollOutcome
    where
        F: FnMut(StreamEvent) -> bool,
    {
        if !emit(StreamEvent::Status(PaymentStatus::Connecting)) {
            return PollOutcome::Cancelled;
        }
        if !emit(StreamEvent::Status(PaymentStatus::Pending)) {
            return PollOutcome::Cancelled;
        }

        loop {
            let wait = self.backend.wait_for_status(&self.payment_hash);
            let response = match self.guarded(wait).await {
                None => return PollOutcome::Cancelled,
                Some(Err(e)) => return Self::fail(&e, &mut emit),
                Some(Ok(response)) => response,
            };

            let (status, record) = match response.status {
                AttemptStatus::Pending => (PaymentStatus::Pending, None),
                AttemptStatus::Complete => (PaymentStatus::Complete, Some(response.record)),
                AttemptStatus::Failed => {
                    let listing = self.backend.list_attempts(&self.payment_hash);
                    let attempts = match self.guarded(listing).await {
                        None => return PollOutcome::Cancelled,
                        Some(Err(e)) => return Self::fail(&e, &mut emit),
                        Some(Ok(attempts)) => attempts,
                    };
                    match recheck(attempts) {
                        Recheck::StillPending => {
                            debug!(
                                payment_hash = %self.payment_hash,
                                "Attempt failed, sibling still in flight"
                            );
                            (PaymentStatus::Pending, None)
                        }
                        Recheck::Settled(record) => (PaymentStatus::Failed, record),
                    }
                }
            };

            debug!(payment_hash = %self.payment_hash, %status, "Status determined");
            if !emit(StreamEvent::Status(status.clone())) {
                return PollOutcome::Cancelled;
            }

            if !status.is_terminal() {
                continue;
            }
            if status == PaymentStatus::Complete {
                let record = record.unwrap_or(Value::Null);
                emit(StreamEvent::Result(record.clone()));
                info!(payment_hash = %self.payment_hash, "Payment complete");
                return PollOutcome::Complete(record);
            }
            info!(payment_hash = %self.payment_hash, "Payment failed");
            return PollOutcome::Failed(record);
        }
    }

    /// Await a backend call unless the stream closes first.
    async fn guarded<T, Fut>(&self, call: Fut) -> Option<Result<T, Error>>
    where
        Fut: Future<Output = Result<T, Error>>,
    {
        if self.closed.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            result = call => Some(result),
        }
    }

    fn fail<F>(error: &Error, emit: &mut F) -> PollOutcome
    where
        F: FnMut(StreamEvent) -> bool,
    {
        let message = error.to_string();
        warn!(error = %message, "Backend call failed, ending stream");
        emit(StreamEvent::Status(PaymentStatus::Error(message.clone())));
        PollOutcome::Errored(message)
    }
}
