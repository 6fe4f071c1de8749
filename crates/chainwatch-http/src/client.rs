//! HTTP JSON-RPC chain client backed by `reqwest`.
//!
//! One client per endpoint URL. Retry, timeout and racing are applied by the
//! listener's policies, so every call here is a single HTTP round trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chainwatch_core::client::ChainRpcClient;
use chainwatch_core::config::ListenerConfig;
use chainwatch_core::error::WatchError;
use chainwatch_core::listener::Endpoint;

use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// An EVM block with full transaction objects, as returned by
/// `eth_getBlockByNumber(n, true)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvmBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    pub transactions: Vec<Value>,
    /// The untouched block object.
    pub raw: Value,
}

#[derive(Deserialize)]
struct BlockFields {
    number: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(rename = "parentHash")]
    parent_hash: String,
    timestamp: String,
    #[serde(default)]
    transactions: Vec<Value>,
}

impl EvmBlock {
    /// Decode a block object. Pending blocks (no hash) decode with an empty hash.
    pub fn from_json(raw: Value) -> Result<Self, WatchError> {
        let fields: BlockFields = serde_json::from_value(raw.clone())?;
        Ok(Self {
            number: parse_hex_u64(&fields.number)?,
            hash: fields.hash.unwrap_or_default(),
            parent_hash: fields.parent_hash,
            timestamp: parse_hex_u64(&fields.timestamp)?,
            transactions: fields.transactions,
            raw,
        })
    }
}

/// Parse a `0x`-prefixed hex quantity. Malformed quantities are
/// [`WatchError::Deserialization`] errors and are not retried.
pub fn parse_hex_u64(s: &str) -> Result<u64, WatchError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| {
        let err: serde_json::Error = serde::de::Error::custom(format!("invalid hex quantity {s:?}: {e}"));
        WatchError::Deserialization(err)
    })
}

/// HTTP JSON-RPC client for a single endpoint.
pub struct HttpChainClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpChainClient {
    /// Create a client whose HTTP requests give up after `request_timeout`.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| WatchError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// One client per URL, sharing the same request timeout.
    pub fn from_urls(
        urls: &[String],
        request_timeout: Duration,
    ) -> Result<Vec<Endpoint<EvmBlock>>, WatchError> {
        urls.iter()
            .map(|url| {
                let client = Self::new(url.clone(), request_timeout)?;
                Ok(Arc::new(client) as Endpoint<EvmBlock>)
            })
            .collect()
    }

    /// Build the endpoint set described by a listener config.
    pub fn from_config(config: &ListenerConfig) -> Result<Vec<Endpoint<EvmBlock>>, WatchError> {
        config.validate()?;
        Self::from_urls(&config.endpoints, config.retry.attempt_timeout())
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, WatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WatchError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    WatchError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::Transport(format!("HTTP {status}: {body}")));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;
        body.into_result()
            .map_err(|e| WatchError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ChainRpcClient for HttpChainClient {
    type Block = EvmBlock;

    async fn get_height(&self) -> Result<u64, WatchError> {
        let result = self.call("eth_blockNumber", vec![]).await?;
        let hex: String = serde_json::from_value(result)?;
        parse_hex_u64(&hex)
    }

    async fn get_block_by_number(&self, height: u64) -> Result<EvmBlock, WatchError> {
        let result = self
            .call("eth_getBlockByNumber", vec![json!(format!("{height:#x}")), json!(true)])
            .await?;
        if result.is_null() {
            return Err(WatchError::NotFound { height });
        }
        let block = EvmBlock::from_json(result)?;
        if block.number != height {
            tracing::warn!(url = %self.url, requested = height, got = block.number, "endpoint returned a different block");
            return Err(WatchError::Transport(format!(
                "requested block {height}, endpoint returned {}",
                block.number
            )));
        }
        Ok(block)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
