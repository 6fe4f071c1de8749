//! First-success race across redundant endpoints.

use std::future::Future;

use tokio::task::JoinSet;

use crate::error::WatchError;

/// Run every job concurrently and return the first successful result.
///
/// Each job runs on its own Tokio task. As soon as one succeeds the remaining
/// tasks are aborted; their late results or failures are never surfaced.
/// Fails with [`WatchError::AllEndpointsFailed`] once every job has failed
/// (so only after the slowest failure), or immediately for an empty input.
/// Which success wins a tie is unspecified.
pub async fn run_parallel_first_success<T, I, Fut>(jobs: I) -> Result<T, WatchError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, WatchError>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for job in jobs {
        set.spawn(job);
    }

    let endpoints = set.len();
    if endpoints == 0 {
        return Err(WatchError::AllEndpointsFailed { endpoints: 0 });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => {
                set.abort_all();
                return Ok(value);
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, remaining = set.len(), "race participant failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, remaining = set.len(), "race participant panicked");
            }
        }
    }

    Err(WatchError::AllEndpointsFailed { endpoints })
}
