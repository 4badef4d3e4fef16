use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Length of a payment hash in hex characters (32 bytes)
pub const PAYMENT_HASH_HEX_LEN: usize = 64;

/// Payment hash, the key of one payment's monitoring session.
///
/// Always stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentHash(String);

impl PaymentHash {
    pub fn parse(value: &str) -> Result<Self, Error> {
        let value = value.trim();
        if value.len() != PAYMENT_HASH_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!("not a payment hash: '{value}'")));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PaymentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PaymentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PaymentHash> for String {
    fn from(hash: PaymentHash) -> Self {
        hash.0
    }
}

/// Status reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Connecting,
    Pending,
    Failed,
    Complete,
    Error(String),
}

impl PaymentStatus {
    /// Whether polling stops at this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Complete | Self::Error(_))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Pending => f.write_str("pending"),
            Self::Failed => f.write_str("failed"),
            Self::Complete => f.write_str("complete"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Status of a single backend attempt (`sendpay` record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Failed,
    Complete,
}

impl FromStr for AttemptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            "complete" => Ok(Self::Complete),
            other => Err(Error::Backend(format!("unknown attempt status '{other}'"))),
        }
    }
}

/// One routing attempt, with the backend's raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub status: AttemptStatus,
    pub record: Value,
}

impl PaymentAttempt {
    /// Build from a raw backend record carrying a `status` field.
    pub fn from_record(record: Value) -> Result<Self, Error> {
        let status = record
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Backend("attempt record has no status".to_string()))?
            .parse()?;
        Ok(Self { status, record })
    }
}

/// Answer of a status long-poll.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitResponse {
    pub status: AttemptStatus,
    pub record: Value,
}

impl WaitResponse {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: AttemptStatus::Pending,
            record: Value::Null,
        }
    }
}

/// The parts of a decoded invoice this service cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedInvoice {
    pub payment_hash: PaymentHash,
    pub amount_msat: Option<u64>,
    pub description: Option<String>,
    pub payee: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "9b0fb5bd0e3a1c8e0d0a2c5b8d8f5f7c2e4a6b8c0d2e4f6a8b0c2d4e6f8a0b2c";

    #[test]
    fn test_payment_hash_normalizes_case() {
        let hash = PaymentHash::parse(&HASH.to_uppercase()).unwrap();
        assert_eq!(hash.as_str(), HASH);
        assert_eq!(hash.to_string(), HASH);
    }

    #[test]
    fn test_payment_hash_rejects_garbage() {
        assert!(PaymentHash::parse("").is_err());
        assert!(PaymentHash::parse("abc").is_err());
        assert!(PaymentHash::parse(&"g".repeat(PAYMENT_HASH_HEX_LEN)).is_err());
        assert!(PaymentHash::parse(&format!("{HASH}00")).is_err());
    }

    #[test]
    fn test_payment_hash_serde() {
        let hash: PaymentHash = serde_json::from_value(json!(HASH)).unwrap();
        assert_eq!(serde_json::to_value(&hash).unwrap(), json!(HASH));
        assert!(serde_json::from_value::<PaymentHash>(json!("nope")).is_err());
    }

    #[test]
    fn test_status_wire_form() {
        assert_eq!(PaymentStatus::Connecting.to_string(), "connecting");
        assert_eq!(PaymentStatus::Pending.to_string(), "pending");
        assert_eq!(PaymentStatus::Failed.to_string(), "failed");
        assert_eq!(PaymentStatus::Complete.to_string(), "complete");
        assert_eq!(
            PaymentStatus::Error("connection refused".to_string()).to_string(),
            "error: connection refused"
        );
    }

    #[test]
    fn test_status_terminality() {
        assert!(!PaymentStatus::Connecting.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Complete.is_terminal());
        assert!(PaymentStatus::Error(String::new()).is_terminal());
    }

    #[test]
    fn test_attempt_from_record() {
        let attempt =
            PaymentAttempt::from_record(json!({"status": "pending", "partid": 1})).unwrap();
        assert_eq!(attempt.status, AttemptStatus::Pending);
        assert_eq!(attempt.record["partid"], 1);

        assert!(PaymentAttempt::from_record(json!({"partid": 1})).is_err());
        assert!(PaymentAttempt::from_record(json!({"status": "lost"})).is_err());
    }
}
