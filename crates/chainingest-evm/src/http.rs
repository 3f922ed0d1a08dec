//! HTTP JSON-RPC client backed by `reqwest`, with bounded retry and
//! exponential backoff for transient transport errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use chainingest_core::error::IngestError;
use chainingest_core::types::{LogFilter, RawLog};

use crate::fetcher::{parse_hex_u64, to_hex_u64, EthLog, EvmRpcClient};

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub result: Option<Value>,
    pub error: Option<JsonRpcErrorObject>,
}

/// The error object of a failed JSON-RPC call.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum retry attempts for transient transport errors.
    pub max_retries: u32,
    /// Initial backoff; doubles per attempt, capped at 64x.
    pub backoff: Duration,
    /// Timeout per individual request.
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC client for a single endpoint.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    config: HttpClientConfig,
    next_id: std::sync::atomic::AtomicU64,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IngestError::Rpc(format!("build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            config,
            next_id: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, IngestError> {
        Self::new(url, HttpClientConfig::default())
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<Value, IngestError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| IngestError::Rpc(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::Rpc(format!("HTTP {status}: {body}")));
        }

        let parsed: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| IngestError::Rpc(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(IngestError::Rpc(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| IngestError::Rpc("rpc response missing result".into()))
    }

    /// Send a call, retrying transient failures with exponential backoff.
    async fn call(&self, method: &'static str, params: Value) -> Result<Value, IngestError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        loop {
            match self.send_once(&req).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff * 2u32.pow(attempt.min(6));
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        url = %self.url,
                        method,
                        "retrying rpc call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, url = %self.url, method, "rpc call failed");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl EvmRpcClient for HttpRpcClient {
    async fn get_block_number(&self) -> Result<u64, IngestError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| IngestError::Rpc("eth_blockNumber: non-string result".into()))?;
        Ok(parse_hex_u64(hex))
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IngestError> {
        let mut params = serde_json::Map::new();
        params.insert("fromBlock".into(), json!(to_hex_u64(from)));
        params.insert("toBlock".into(), json!(to_hex_u64(to)));
        if !filter.addresses.is_empty() {
            params.insert("address".into(), json!(filter.addresses));
        }
        if !filter.topic0_values.is_empty() {
            // Nested array: any of these topic0 values.
            params.insert("topics".into(), json!([filter.topic0_values]));
        }

        let result = self.call("eth_getLogs", json!([Value::Object(params)])).await?;
        let wire: Vec<EthLog> = serde_json::from_value(result)
            .map_err(|e| IngestError::Rpc(format!("eth_getLogs: malformed result: {e}")))?;
        wire.into_iter().map(EthLog::into_raw).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_shape() {
        let req = JsonRpcRequest::new(7, "eth_blockNumber", json!([]));
        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["id"], 7);
        assert_eq!(encoded["method"], "eth_blockNumber");
        assert_eq!(encoded["params"], json!([]));
    }

    #[test]
    fn response_error_object_parses() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"range too large"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32005);
        assert!(resp.result.is_none());
    }
}
