//! clnrest client errors
//!
//! Pure vendor errors; mapped onto the crate error per call site.

use serde_json::Value;
use thiserror::Error;

use crate::error::Error;

#[derive(Debug, Error)]
pub enum ClnError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("RPC error: {message}")]
    Rpc {
        code: Option<i64>,
        message: String,
        data: Option<Value>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClnError {
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClnError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ClnError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<ClnError> for Error {
    fn from(err: ClnError) -> Self {
        match err {
            ClnError::InvalidConfig(msg) | ClnError::InvalidHeader(msg) => Self::Configuration(msg),
            ClnError::Timeout(msg) => Self::Timeout(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}
