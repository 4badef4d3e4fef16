mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use invoicepayer_core::{logging, ClnRestClient, Config};
use invoicepayer_stream::{PaymentStreamManager, PaymentSubmitter, StreamSettings};

use server::InvoicePayerServer;

#[derive(Parser, Debug)]
#[command(name = "invoicepayer")]
#[command(about = "Pays Lightning invoices and streams their status", long_about = None)]
struct Args {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "INVOICEPAYER_CONFIG")]
    config: Option<String>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("invoicepayer starting...");
    info!("HTTP address: {}", config.http_address());
    info!("Lightning node: {}", config.cln.url);

    // 4. Node client, shared by decoding, paying and status polling
    let node = Arc::new(ClnRestClient::new(&config.cln)?);

    // 5. Stream engine
    let manager = PaymentStreamManager::new(node.clone(), StreamSettings::from(&config.stream));
    let submitter = PaymentSubmitter::new(
        node.clone(),
        node,
        config.stream.submit_grace(),
        manager.tasks().clone(),
    );

    // 6. Serve until shutdown
    InvoicePayerServer::new(config, manager, submitter).start().await?;

    info!("invoicepayer stopped");
    Ok(())
}
