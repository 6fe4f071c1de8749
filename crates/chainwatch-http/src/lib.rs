//! chainwatch-http — HTTP JSON-RPC implementation of [`ChainRpcClient`] for EVM chains.
//!
//! ```rust,no_run
//! use chainwatch_core::ListenerBuilder;
//! use chainwatch_http::HttpChainClient;
//!
//! let config = ListenerBuilder::new()
//!     .endpoint("https://rpc.ankr.com/eth")
//!     .endpoint("https://eth.llamarpc.com")
//!     .build()
//!     .unwrap();
//! let endpoints = HttpChainClient::from_config(&config).unwrap();
//! assert_eq!(endpoints.len(), 2);
//! ```
//!
//! [`ChainRpcClient`]: chainwatch_core::ChainRpcClient

pub mod client;
pub mod request;

pub use client::{parse_hex_u64, EvmBlock, HttpChainClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
