//! # Publish strategies.
//!
//! A publish strategy receives the bus snapshot and one message and decides how the
//! handlers run.
//!
//! - [`Parallel`] - all handlers at once, inline; awaits all, aggregates failures
//! - [`ForcedParallel`] - like [`Parallel`] but every handler runs on its own tokio task
//! - [`Serial`] - one at a time in snapshot order; first failure aborts the rest
//! - [`SingleReceiver`] - exactly one handler, picked by a selector (default: first)
//! - [`FireAndForget`] - runs an inner strategy detached; failures are logged only
//! - [`ChainPublisher`] - routes each delivery through a decorator chain
//!
//! [`PublishStrategy`] names the built-in strategies for configuration.

mod chain;
mod detached;
mod parallel;
mod serial;
mod single;
mod strategy;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::Handler;

pub use chain::{ChainPublisher, Delivery};
pub use detached::FireAndForget;
pub use parallel::{ForcedParallel, Parallel};
pub use serial::Serial;
pub use single::{Selector, SingleReceiver};
pub use strategy::PublishStrategy;

/// Immutable point-in-time view of a bus's handlers.
pub type Snapshot<T> = Arc<Vec<Handler<T>>>;

/// # Strategy for delivering one message to a snapshot of handlers.
///
/// The returned future resolves once the strategy's delivery guarantee is met.
/// A strategy fails only where its policy surfaces a handler failure.
#[async_trait]
pub trait Publish<T>: Send + Sync + 'static {
    /// Delivers `message` to `handlers`.
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}
