use serde::Deserialize;
use serde_json::Value;

/// `waitsendpay` timed out with the payment still in flight
pub const PAY_IN_PROGRESS: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListSendPaysResponse {
    #[serde(default)]
    pub payments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DecodePayResponse {
    pub payment_hash: String,
    #[serde(default)]
    pub amount_msat: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payee: Option<String>,
}

impl DecodePayResponse {
    /// Amount in millisatoshi. Older nodes render it as `"1000msat"`.
    pub fn amount_msat(&self) -> Option<u64> {
        match self.amount_msat.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim_end_matches("msat").parse().ok(),
            _ => None,
        }
    }
}

/// Human-readable message of an RPC error value.
///
/// Object errors yield their `message`, string errors themselves, anything
/// else is quoted as unknown.
#[must_use]
pub fn rpc_error_message(error: &Value) -> String {
    match error {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| format!("unknown: '{error}'"), str::to_string),
        Value::String(s) => s.clone(),
        other => format!("unknown: '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_error_message() {
        assert_eq!(
            rpc_error_message(&json!({"code": 205, "message": "Could not find a route"})),
            "Could not find a route"
        );
        assert_eq!(rpc_error_message(&json!("plain failure")), "plain failure");
        assert_eq!(rpc_error_message(&json!(42)), "unknown: '42'");
        assert_eq!(
            rpc_error_message(&json!({"code": 1})),
            "unknown: '{\"code\":1}'"
        );
    }

    #[test]
    fn test_decodepay_amount_forms() {
        let numeric: DecodePayResponse =
            serde_json::from_value(json!({"payment_hash": "aa", "amount_msat": 1500})).unwrap();
        assert_eq!(numeric.amount_msat(), Some(1500));

        let legacy: DecodePayResponse =
            serde_json::from_value(json!({"payment_hash": "aa", "amount_msat": "2000msat"}))
                .unwrap();
        assert_eq!(legacy.amount_msat(), Some(2000));

        let absent: DecodePayResponse =
            serde_json::from_value(json!({"payment_hash": "aa"})).unwrap();
        assert_eq!(absent.amount_msat(), None);
    }
}
