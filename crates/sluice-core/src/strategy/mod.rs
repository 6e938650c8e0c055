//! Pluggable admission strategies.
//!
//! Every strategy satisfies the same capability — `accept(user_id, rate,
//! path) -> bool` — so the admission pipeline can dispatch to whichever one
//! is configured for a path without knowing its internals. New strategies
//! are added by implementing [`LimitStrategy`]; no changes to the pipeline
//! are required.

pub mod fixed_window;
pub mod token_bucket;

use async_trait::async_trait;

/// Capability shared by every admission strategy.
///
/// Preconditions: `rate_per_sec > 0`; `path` is one for which this strategy
/// is installed. No implementation may propagate an error — internal I/O
/// failures are logged and resolved to `false` (fail-closed).
#[async_trait]
pub trait LimitStrategy: Send + Sync {
    async fn accept(&self, user_id: &str, rate_per_sec: f64, path: &str) -> bool;
}

pub use fixed_window::FixedWindowStrategy;
pub use token_bucket::TokenBucketStrategy;
