//! Payment backend interfaces
//!
//! The stream engine only talks to the node through these traits; the
//! Core Lightning REST client is the production implementation.

pub mod cln;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{DecodedInvoice, PaymentAttempt, PaymentHash, WaitResponse};

pub use cln::ClnRestClient;

/// Node operations needed to pay invoices and follow their progress.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Long-poll the status of a payment. May block for a backend-defined
    /// time and answer `pending` when nothing changed.
    async fn wait_for_status(&self, payment_hash: &PaymentHash) -> Result<WaitResponse>;

    /// Every attempt the node made for this payment hash.
    async fn list_attempts(&self, payment_hash: &PaymentHash) -> Result<Vec<PaymentAttempt>>;

    /// Pay an invoice. Resolves once the node gives up or succeeds.
    async fn pay(&self, invoice: &str) -> Result<Value>;
}

/// Turns a raw invoice string into its identifying parts.
#[async_trait]
pub trait InvoiceDecoder: Send + Sync {
    async fn decode(&self, invoice: &str) -> Result<DecodedInvoice>;
}
