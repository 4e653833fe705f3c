//! # Built-in publish strategy selection
//!
//! [`PublishStrategy`] names the strategy a [`Bus`](crate::Bus) is configured with.
//!
//! ## Variants
//! - `Parallel`: invoke all handlers concurrently, await all.
//! - `ForcedParallel`: spawn every handler on its own task, await all.
//! - `Serial`: one after another, stop on the first failure.
//! - `SingleReceiver`: deliver to the first handler only.
//!
//! ## Invariants
//! - Strategies never drop a handler failure silently; detached publishing is the only
//!   mode that hides failures from the caller, and it logs them.

use std::sync::Arc;

use crate::publishers::{ForcedParallel, Parallel, Publish, Serial, SingleReceiver};

/// Built-in publish strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "wiring", derive(serde::Deserialize))]
pub enum PublishStrategy {
    /// Invoke handlers concurrently on the publishing task.
    ///
    /// Use when:
    /// - Handlers are mostly async and independent
    /// - The publisher wants every outcome
    #[default]
    Parallel,

    /// Invoke each handler on its own tokio task.
    ///
    /// Use when:
    /// - Handlers do blocking or CPU-heavy work before their first await
    /// - Publisher latency must not depend on synchronous handler bodies
    ForcedParallel,

    /// Invoke handlers in subscription snapshot order.
    ///
    /// Use when:
    /// - Later handlers depend on the effects of earlier ones
    /// - A failure must stop the pipeline
    Serial,

    /// Invoke exactly one handler (the first).
    ///
    /// Use when:
    /// - Handlers are interchangeable consumers of a work item
    /// - For custom routing use [`SingleReceiver::with_selector`] with
    ///   [`Bus::with_publisher`](crate::Bus::with_publisher)
    SingleReceiver,
}

impl PublishStrategy {
    /// Instantiates the strategy.
    pub fn publisher<T>(self) -> Arc<dyn Publish<T>>
    where
        T: Send + Sync + 'static,
    {
        match self {
            PublishStrategy::Parallel => Arc::new(Parallel),
            PublishStrategy::ForcedParallel => Arc::new(ForcedParallel),
            PublishStrategy::Serial => Arc::new(Serial),
            PublishStrategy::SingleReceiver => Arc::new(SingleReceiver::<T>::new()),
        }
    }
}
