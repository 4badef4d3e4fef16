use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cln: ClnConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// How long in-flight requests get to finish after a shutdown signal
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Core Lightning REST (clnrest) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClnConfig {
    /// Base URL of the clnrest endpoint, e.g. `https://127.0.0.1:3010`
    pub url: String,
    /// Rune sent in the `Rune` header of every call
    pub rune: String,
    pub request_timeout_seconds: u64,
    /// Server-side timeout passed to `waitsendpay`
    pub wait_timeout_seconds: u64,
    /// clnrest ships with a self-signed certificate by default
    pub accept_invalid_certs: bool,
}

impl Default for ClnConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            rune: String::new(),
            request_timeout_seconds: 90,
            wait_timeout_seconds: 60,
            accept_invalid_certs: false,
        }
    }
}

/// Timings of the per-payment event streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub keepalive_interval_seconds: u64,
    pub retry_hint_delay_ms: u64,
    /// Reconnect delay advertised to observers through the SSE `retry:` field
    pub retry_hint_ms: u64,
    pub reaper_interval_seconds: u64,
    /// How long a submission waits for `pay` to fail before redirecting
    pub submit_grace_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_seconds: 25,
            retry_hint_delay_ms: 1_000,
            retry_hint_ms: 3_000,
            reaper_interval_seconds: 120,
            submit_grace_ms: 1_000,
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub const fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_seconds)
    }

    #[must_use]
    pub const fn retry_hint_delay(&self) -> Duration {
        Duration::from_millis(self.retry_hint_delay_ms)
    }

    #[must_use]
    pub const fn retry_hint(&self) -> Duration {
        Duration::from_millis(self.retry_hint_ms)
    }

    #[must_use]
    pub const fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds)
    }

    #[must_use]
    pub const fn submit_grace(&self) -> Duration {
        Duration::from_millis(self.submit_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    ///
    /// `CLN_HOST` and `CLN_RUNE` are still read when the prefixed
    /// variables leave the backend unset.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // INVOICEPAYER_CLN__URL, INVOICEPAYER_SERVER__HTTP_PORT, ...
        builder = builder.add_source(
            Environment::with_prefix("INVOICEPAYER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply_legacy_vars(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Fill unset backend settings from the bare `CLN_*` variables.
    pub fn apply_legacy_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.cln.url.is_empty() {
            if let Some(host) = lookup("CLN_HOST").filter(|h| !h.is_empty()) {
                self.cln.url = if host.starts_with("http://") || host.starts_with("https://") {
                    host
                } else {
                    format!("https://{host}")
                };
            }
        }
        if self.cln.rune.is_empty() {
            if let Some(rune) = lookup("CLN_RUNE").filter(|r| !r.is_empty()) {
                self.cln.rune = rune;
            }
        }
    }

    /// Check the whole configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.cln.url.is_empty() {
            errors.push("cln.url is required (or set CLN_HOST)".to_string());
        } else if !(self.cln.url.starts_with("http://") || self.cln.url.starts_with("https://")) {
            errors.push(format!("cln.url must be an http(s) URL, got '{}'", self.cln.url));
        }
        if self.cln.rune.is_empty() {
            errors.push("cln.rune is required (or set CLN_RUNE)".to_string());
        }
        if self.cln.request_timeout_seconds <= self.cln.wait_timeout_seconds {
            errors.push(format!(
                "cln.request_timeout_seconds ({}) must exceed cln.wait_timeout_seconds ({})",
                self.cln.request_timeout_seconds, self.cln.wait_timeout_seconds
            ));
        }
        if self.stream.keepalive_interval_seconds == 0 {
            errors.push("stream.keepalive_interval_seconds must be non-zero".to_string());
        }
        if self.stream.reaper_interval_seconds == 0 {
            errors.push("stream.reaper_interval_seconds must be non-zero".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.cln.url = "https://127.0.0.1:3010".to_string();
        config.cln.rune = "rune".to_string();
        config
    }

    #[test]
    fn test_default_stream_timings() {
        let stream = StreamConfig::default();
        assert_eq!(stream.keepalive_interval(), Duration::from_secs(25));
        assert_eq!(stream.retry_hint_delay(), Duration::from_secs(1));
        assert_eq!(stream.retry_hint(), Duration::from_secs(3));
        assert_eq!(stream.reaper_interval(), Duration::from_secs(120));
        assert_eq!(stream.submit_grace(), Duration::from_secs(1));
    }

    #[test]
    fn test_http_address() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.http_port = 9000;
        assert_eq!(config.http_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("cln.url")));
        assert!(errors.iter().any(|e| e.contains("cln.rune")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_validate_wait_timeout_below_request_timeout() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.cln.wait_timeout_seconds = config.cln.request_timeout_seconds;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("wait_timeout_seconds"));
    }

    #[test]
    fn test_legacy_vars_fill_backend() {
        let mut config = Config::default();
        config.apply_legacy_vars(|key| match key {
            "CLN_HOST" => Some("node.example:3010".to_string()),
            "CLN_RUNE" => Some("abc".to_string()),
            _ => None,
        });
        assert_eq!(config.cln.url, "https://node.example:3010");
        assert_eq!(config.cln.rune, "abc");
    }

    #[test]
    fn test_legacy_vars_do_not_override() {
        let mut config = valid_config();
        config.apply_legacy_vars(|_| Some("http://other:1".to_string()));
        assert_eq!(config.cln.url, "https://127.0.0.1:3010");
        assert_eq!(config.cln.rune, "rune");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let toml = concat!(
            "[server]\nhttp_port = 9191\n\n",
            "[cln]\nurl = \"http://localhost:3010\"\nrune = \"r\"\n\n",
            "[stream]\nreaper_interval_seconds = 5\n",
        );
        writeln!(file, "{toml}").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.http_port, 9191);
        assert_eq!(config.cln.url, "http://localhost:3010");
        assert_eq!(config.stream.reaper_interval_seconds, 5);
        assert_eq!(config.stream.keepalive_interval_seconds, 25);
    }
}
