//! clnrest HTTP client
//!
//! Every RPC is `POST {url}/v1/{method}` with a JSON object of named
//! parameters and the rune in the `Rune` header.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::error::ClnError;
use super::types::{rpc_error_message, DecodePayResponse, ListSendPaysResponse, PAY_IN_PROGRESS};
use crate::backend::{InvoiceDecoder, PaymentBackend};
use crate::config::ClnConfig;
use crate::error::{Error, Result};
use crate::models::{AttemptStatus, DecodedInvoice, PaymentAttempt, PaymentHash, WaitResponse};

const RUNE_HEADER: HeaderName = HeaderName::from_static("rune");

/// Core Lightning REST client
pub struct ClnRestClient {
    base_url: String,
    rune: String,
    wait_timeout_seconds: u64,
    client: Client,
}

impl ClnRestClient {
    pub fn new(config: &ClnConfig) -> std::result::Result<Self, ClnError> {
        if config.url.is_empty() {
            return Err(ClnError::InvalidConfig("clnrest url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            rune: config.rune.clone(),
            wait_timeout_seconds: config.wait_timeout_seconds,
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self) -> std::result::Result<HeaderMap, ClnError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(RUNE_HEADER, HeaderValue::from_str(&self.rune)?);
        Ok(headers)
    }

    /// Invoke one RPC method, returning its result object.
    pub async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, ClnError> {
        let url = format!("{}/v1/{method}", self.base_url);
        debug!(method, "clnrest call");

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ClnError::Parse(format!("{method} returned non-JSON body (HTTP {status}): {e}"))
        })?;

        if let Some(error) = body.get("error") {
            return Err(rpc_error(error));
        }
        if !status.is_success() {
            return Err(rpc_error(&body));
        }
        Ok(body)
    }
}

fn rpc_error(error: &Value) -> ClnError {
    ClnError::Rpc {
        code: error.get("code").and_then(Value::as_i64),
        message: rpc_error_message(error),
        data: error.get("data").cloned(),
    }
}

fn is_failed_record(data: &Value) -> bool {
    data.get("status").and_then(Value::as_str) == Some("failed")
}

#[async_trait]
impl PaymentBackend for ClnRestClient {
    async fn wait_for_status(&self, payment_hash: &PaymentHash) -> Result<WaitResponse> {
        let params = json!({
            "payment_hash": payment_hash.as_str(),
            "timeout": self.wait_timeout_seconds,
        });

        match self.call("waitsendpay", params).await {
            Ok(record) => {
                let status = match record.get("status").and_then(Value::as_str) {
                    Some(s) => s.parse()?,
                    None => AttemptStatus::Complete,
                };
                Ok(WaitResponse { status, record })
            }
            Err(ClnError::Rpc {
                code: Some(PAY_IN_PROGRESS),
                ..
            }) => Ok(WaitResponse::pending()),
            Err(ClnError::Rpc {
                data: Some(data), ..
            }) if is_failed_record(&data) => Ok(WaitResponse {
                status: AttemptStatus::Failed,
                record: data,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_attempts(&self, payment_hash: &PaymentHash) -> Result<Vec<PaymentAttempt>> {
        let body = self
            .call("listsendpays", json!({ "payment_hash": payment_hash.as_str() }))
            .await?;
        let response: ListSendPaysResponse = serde_json::from_value(body)
            .map_err(|e| Error::Backend(format!("malformed listsendpays response: {e}")))?;

        response
            .payments
            .into_iter()
            .map(PaymentAttempt::from_record)
            .collect()
    }

    async fn pay(&self, invoice: &str) -> Result<Value> {
        match self.call("pay", json!({ "bolt11": invoice })).await {
            Ok(record) => Ok(record),
            Err(ClnError::Rpc { message, .. }) => Err(Error::PaymentFailed(message)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl InvoiceDecoder for ClnRestClient {
    async fn decode(&self, invoice: &str) -> Result<DecodedInvoice> {
        let body = match self.call("decodepay", json!({ "bolt11": invoice })).await {
            Ok(body) => body,
            Err(ClnError::Rpc { message, .. }) => return Err(Error::Decode(message)),
            Err(e) => return Err(e.into()),
        };

        let decoded: DecodePayResponse = serde_json::from_value(body)
            .map_err(|e| Error::Backend(format!("malformed decodepay response: {e}")))?;
        let payment_hash = PaymentHash::parse(&decoded.payment_hash)
            .map_err(|e| Error::Decode(e.to_string()))?;

        Ok(DecodedInvoice {
            payment_hash,
            amount_msat: decoded.amount_msat(),
            description: decoded.description.clone(),
            payee: decoded.payee.clone(),
        })
    }
}
