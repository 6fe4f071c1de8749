//! chainwatch-core — deliver confirmed blocks from redundant, unreliable RPC endpoints.
//!
//! # Architecture
//!
//! ```text
//! BlockListener (timer, single-flight poll cycles, start/stop/cancel/dispose)
//!     ├── HeightTracker              (confirmation depth, cold-start seeding)
//!     ├── run_parallel_first_success (race all endpoints, abort losers)
//!     │       └── execute_with_timeout (per-attempt timeout + DelayStrategy backoff)
//!     ├── ChainRpcClient × N         (get_height, get_block_by_number)
//!     └── BlockExecutor              (downstream, called once per confirmed block)
//! ```
//!
//! Blocks reach the executor in strictly increasing height order. The cursor
//! lives in memory only; nothing is persisted across restarts.

pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod policy;
pub mod tracker;

pub use client::{BlockExecutor, ChainRpcClient};
pub use config::{ListenerBuilder, ListenerConfig};
pub use error::WatchError;
pub use listener::{
    BlockListener, CycleReport, Endpoint, ListenerSnapshot, ListenerStatus, PollOutcome,
};
pub use policy::{
    execute_with_timeout, run_parallel_first_success, DelayStrategy, ExponentialDelay,
    FixedDelay, RetryConfig,
};
pub use tracker::{CyclePlan, HeightTracker, ListenerState};
