use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use invoicepayer_api::{create_router, AppState};
use invoicepayer_core::Config;
use invoicepayer_stream::{PaymentStreamManager, PaymentSubmitter};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// HTTP server plus the stream engine behind it
pub struct InvoicePayerServer {
    config: Config,
    manager: PaymentStreamManager,
    submitter: PaymentSubmitter,
}

impl InvoicePayerServer {
    pub const fn new(
        config: Config,
        manager: PaymentStreamManager,
        submitter: PaymentSubmitter,
    ) -> Self {
        Self {
            config,
            manager,
            submitter,
        }
    }

    /// Serve until a shutdown signal, then close every payment stream and
    /// let connections drain for at most `server.shutdown_timeout_seconds`.
    pub async fn start(self) -> anyhow::Result<()> {
        let http_address = self.config.http_address();
        let listener = TcpListener::bind(&http_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP server to {http_address}: {e}"))?;
        info!("HTTP server listening on {}", http_address);

        let drain_timeout = self.config.server.shutdown_timeout();
        let manager = self.manager.clone();
        let router = create_router(AppState::new(self.manager, self.submitter));

        // Fired once streams are closed and the server starts draining
        let draining = Arc::new(Notify::new());
        let notify = Arc::clone(&draining);

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                info!("Shutdown signal received, starting graceful shutdown...");
                // Closing the streams ends every open SSE response
                manager.shutdown(drain_timeout).await;
                notify.notify_one();
            })
            .into_future();

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("HTTP server error: {}", e);
                    return Err(e.into());
                }
            }
            () = drain_deadline(&draining, drain_timeout) => {
                warn!(
                    "Connections still open after {}s, forcing shutdown",
                    drain_timeout.as_secs()
                );
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}

async fn drain_deadline(draining: &Notify, timeout: Duration) {
    draining.notified().await;
    tokio::time::sleep(timeout).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
