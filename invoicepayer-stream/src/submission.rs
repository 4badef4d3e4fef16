// Invoice submission.
//
// Decoding happens synchronously. Payment is started in the background and
// the caller only waits out a short grace window: a failure inside it is
// reported, anything slower is left for the stream to show. Payment tasks
// run on the stream manager's tracker so shutdown waits for them.

use invoicepayer_core::{DecodedInvoice, Error, InvoiceDecoder, PaymentBackend, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{info, warn, Instrument};

pub struct PaymentSubmitter {
    decoder: Arc<dyn InvoiceDecoder>,
    backend: Arc<dyn PaymentBackend>,
    grace: Duration,
    tasks: TaskTracker,
}

impl PaymentSubmitter {
    pub fn new(
        decoder: Arc<dyn InvoiceDecoder>,
        backend: Arc<dyn PaymentBackend>,
        grace: Duration,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            decoder,
            backend,
            grace,
            tasks,
        }
    }

    /// Decode `invoice` and start paying it.
    ///
    /// Returns the decoded invoice unless decoding fails or the payment
    /// fails within the grace window.
    pub async fn submit(&self, invoice: &str) -> Result<DecodedInvoice> {
        let invoice = invoice.trim();
        if invoice.is_empty() {
            return Err(Error::InvalidInput("invoice is required".to_string()));
        }

        let decoded = self.decoder.decode(invoice).await?;
        let payment_hash = decoded.payment_hash.clone();

        let span = tracing::info_span!("pay", payment_hash = %payment_hash);
        let backend = Arc::clone(&self.backend);
        let owned = invoice.to_string();
        let mut handle = self.tasks.spawn(
            async move {
                let result = backend.pay(&owned).await;
                match &result {
                    Ok(_) => info!("Payment settled"),
                    Err(e) => warn!(error = %e, "Payment did not settle"),
                }
                result
            }
            .instrument(span),
        );

        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(Ok(Ok(_))) => Ok(decoded),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join)) => Err(Error::Internal(format!("payment task failed: {join}"))),
            // Still in flight; the task keeps running detached
            Err(_) => {
                info!(payment_hash = %payment_hash, "Payment in flight, handing over to stream");
                Ok(decoded)
            }
        }
    }
}
