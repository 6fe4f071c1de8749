//! Collaborator contracts: the per-endpoint chain client and the block executor.

use async_trait::async_trait;

use crate::error::WatchError;

/// One RPC endpoint able to report the chain head and serve blocks by number.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; every call may run on its own
/// Tokio task while racing the other endpoints.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn ChainRpcClient<Block = B>>`.
#[async_trait]
pub trait ChainRpcClient: Send + Sync + 'static {
    /// Block payload handed to the executor. Never interpreted by the listener.
    type Block: Send + 'static;

    /// Current raw chain head as seen by this endpoint.
    async fn get_height(&self) -> Result<u64, WatchError>;

    /// Fetch the block at `height`; `NotFound` if this endpoint lacks it.
    async fn get_block_by_number(&self, height: u64) -> Result<Self::Block, WatchError>;

    /// Endpoint identifier (URL or name) used in logs.
    fn url(&self) -> &str;
}

/// Downstream consumer of confirmed blocks.
///
/// Delivery is at-least-once: a rollback via `cancel()` redelivers blocks, so
/// implementations must tolerate seeing the same block more than once.
#[async_trait]
pub trait BlockExecutor<B>: Send + Sync + 'static {
    /// Process one confirmed block. An `Err` is logged and does not stop the cycle.
    async fn execute(&self, height: u64, block: B) -> Result<(), WatchError>;
}
