//! Listener configuration and fluent builder.
//!
//! # Example
//!
//! ```rust
//! use chainwatch_core::config::ListenerBuilder;
//!
//! let config = ListenerBuilder::new()
//!     .endpoint("https://rpc.ankr.com/eth")
//!     .endpoint("https://eth.llamarpc.com")
//!     .confirmation_depth(12)
//!     .poll_interval_ms(5_000)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.endpoints.len(), 2);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WatchError;
use crate::policy::RetryConfig;

/// Configuration for a [`BlockListener`](crate::listener::BlockListener).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// JSON-RPC endpoint URLs; one client is raced per URL.
    pub endpoints: Vec<String>,
    /// Blocks subtracted from the observed head before a block is delivered.
    /// Typical values: 12 (Ethereum PoS), 64 (Ethereum safe), 1 (fast chains).
    pub confirmation_depth: u64,
    /// Timer period between poll cycles (milliseconds).
    pub poll_interval_ms: u64,
    /// Timeout and backoff applied to each endpoint call.
    pub retry: RetryConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![],
            confirmation_depth: 12,
            poll_interval_ms: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configurations that could never poll successfully.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.endpoints.is_empty() {
            return Err(WatchError::InvalidConfig("at least one endpoint is required".into()));
        }
        if let Some(i) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(WatchError::InvalidConfig(format!("endpoint #{i} is blank")));
        }
        validate_timing(self.poll_interval_ms, &self.retry)
    }
}

/// Validation for settings that do not depend on how endpoints are supplied.
pub(crate) fn validate_timing(poll_interval_ms: u64, retry: &RetryConfig) -> Result<(), WatchError> {
    if poll_interval_ms == 0 {
        return Err(WatchError::InvalidConfig("poll interval must be positive".into()));
    }
    if retry.max_attempts == 0 {
        return Err(WatchError::InvalidConfig("max_attempts must be at least 1".into()));
    }
    if retry.attempt_timeout_ms == 0 {
        return Err(WatchError::InvalidConfig("attempt timeout must be positive".into()));
    }
    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        return Err(WatchError::InvalidConfig(format!(
            "backoff multiplier must be >= 1.0, got {}",
            retry.multiplier
        )));
    }
    Ok(())
}

/// Fluent builder for `ListenerConfig`.
#[derive(Default)]
pub struct ListenerBuilder {
    config: ListenerConfig,
}

impl ListenerBuilder {
    pub fn new() -> Self {
        Self {
            config: ListenerConfig::default(),
        }
    }

    /// Add one endpoint URL.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.push(url.into());
        self
    }

    /// Replace the endpoint list.
    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Set confirmation depth (blocks behind head before delivery).
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.config.confirmation_depth = depth;
        self
    }

    /// Set the polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the per-call retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Validate and return the `ListenerConfig`.
    pub fn build(self) -> Result<ListenerConfig, WatchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ListenerBuilder::new().endpoint("http://localhost:8545").build().unwrap();
        assert_eq!(cfg.confirmation_depth, 12);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.retry, RetryConfig::default());
    }

    #[test]
    fn builder_custom() {
        let cfg = ListenerBuilder::new()
            .endpoints(["http://a:8545", "http://b:8545"])
            .confirmation_depth(2)
            .poll_interval_ms(250)
            .build()
            .unwrap();
        assert_eq!(cfg.endpoints, vec!["http://a:8545", "http://b:8545"]);
        assert_eq!(cfg.confirmation_depth, 2);
        assert_eq!(cfg.poll_interval_ms, 250);
    }

    #[test]
    fn empty_endpoints_rejected() {
        let err = ListenerBuilder::new().build().unwrap_err();
        assert!(matches!(err, WatchError::InvalidConfig(_)));
    }

    #[test]
    fn blank_endpoint_rejected() {
        let err = ListenerBuilder::new().endpoint("http://a").endpoint("  ").build().unwrap_err();
        assert!(err.to_string().contains("endpoint #1"));
    }

    #[test]
    fn zero_interval_rejected() {
        let err = ListenerBuilder::new()
            .endpoint("http://a")
            .poll_interval_ms(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidConfig(_)));
    }

    #[test]
    fn bad_retry_rejected() {
        let zero_attempts = RetryConfig { max_attempts: 0, ..Default::default() };
        assert!(ListenerBuilder::new().endpoint("http://a").retry(zero_attempts).build().is_err());

        let shrinking = RetryConfig { multiplier: 0.5, ..Default::default() };
        assert!(ListenerBuilder::new().endpoint("http://a").retry(shrinking).build().is_err());

        let nan = RetryConfig { multiplier: f64::NAN, ..Default::default() };
        assert!(ListenerBuilder::new().endpoint("http://a").retry(nan).build().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ListenerConfig = serde_json::from_str(
            r#"{ "endpoints": ["http://a"], "confirmation_depth": 3, "retry": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.confirmation_depth, 3);
        assert_eq!(cfg.poll_interval_ms, 5_000);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.attempt_timeout_ms, 10_000);
        cfg.validate().unwrap();
    }
}
