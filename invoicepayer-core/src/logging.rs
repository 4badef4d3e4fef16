//! Tracing subscriber setup

use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level. Everything else is
/// held at `warn` unless `RUST_LOG` says otherwise.
const OWN_TARGETS: &[&str] = &[
    "invoicepayer",
    "invoicepayer_core",
    "invoicepayer_stream",
    "invoicepayer_api",
    "tower_http",
];

/// Install the global subscriber: JSON or pretty output, to stdout or
/// appended to `file_path`.
///
/// Each payment stream runs inside a `payment_stream` span, so span close
/// events mark when a stream's tasks ended.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let writer = match &config.file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let layer = if config.format == "json" {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_file(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;
    Ok(())
}

fn default_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    let directives = OWN_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .fold("warn".to_string(), |acc, d| format!("{acc},{d}"));
    EnvFilter::new(directives)
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
