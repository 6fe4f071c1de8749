//! Reliability policies applied to every endpoint query.
//!
//! ```text
//! query → run_parallel_first_success ─┬─ execute_with_timeout → endpoint A
//!                                     ├─ execute_with_timeout → endpoint B
//!                                     └─ execute_with_timeout → endpoint C
//! ```

pub mod delay;
pub mod race;
pub mod retry;

pub use delay::{DelayStrategy, ExponentialDelay, FixedDelay};
pub use race::run_parallel_first_success;
pub use retry::{execute_with_timeout, RetryConfig};
