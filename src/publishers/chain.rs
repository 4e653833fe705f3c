//! # Chain-backed publish strategy.
//!
//! [`ChainPublisher`] runs every (message, handler) pair of a publish through a
//! decorator chain before the handler is invoked. Decorators placed there apply
//! bus-wide: a `concurrent(4)` caps in-flight handler invocations across all
//! subscriptions of the bus.
//!
//! ```text
//! publish(snapshot, msg) ──► for each handler: Delivery { msg, handler }
//!                                 └─► chain (filter, concurrent, retry, ...) ──► deliver()
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::chain::{Chain, ChainBuilder, ChainPlan};
use crate::error::{BuildError, HandlerError};
use crate::handlers::{Handler, HandlerFuture, invoke_guarded};
use crate::publishers::{Publish, Snapshot};

/// One message paired with the subscription handler it is addressed to.
pub struct Delivery<T> {
    message: Arc<T>,
    handler: Handler<T>,
}

impl<T> Delivery<T>
where
    T: Send + Sync + 'static,
{
    /// The published message.
    pub fn message(&self) -> &Arc<T> {
        &self.message
    }

    /// The addressed subscription handler.
    pub fn handler(&self) -> &Handler<T> {
        &self.handler
    }

    /// Invokes the addressed handler with the message.
    pub async fn deliver(&self, ctx: CancellationToken) -> Result<(), HandlerError> {
        invoke_guarded(&self.handler, Arc::clone(&self.message), ctx).await
    }
}

impl<T> fmt::Debug for Delivery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<In, T> ChainBuilder<In, Delivery<T>>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Terminates a publisher chain by invoking the addressed handler.
    pub fn deliver(self) -> ChainPlan<In> {
        self.terminal(Arc::new(
            |delivery: Arc<Delivery<T>>, ctx: CancellationToken| -> HandlerFuture {
                Box::pin(async move { delivery.deliver(ctx).await })
            },
        ))
    }
}

/// Publishes every delivery concurrently through a decorator chain.
///
/// Completion and failure policy match [`Parallel`](crate::publishers::Parallel).
pub struct ChainPublisher<T> {
    chain: Chain<Delivery<T>>,
}

impl<T> ChainPublisher<T>
where
    T: Send + Sync + 'static,
{
    /// Builds the publisher chain.
    ///
    /// # Example
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), chainbus::BuildError> {
    /// use std::sync::Arc;
    /// use chainbus::{Bus, ChainPublisher};
    ///
    /// let publisher = ChainPublisher::<String>::new(|b| b.concurrent(8).deliver())?;
    /// let bus = Bus::with_publisher(Arc::new(publisher));
    /// # let _ = bus;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<F>(configure: F) -> Result<Self, BuildError>
    where
        F: FnOnce(ChainBuilder<Delivery<T>>) -> ChainPlan<Delivery<T>>,
    {
        Ok(Self::from_chain(configure(ChainBuilder::new()).build()?))
    }

    /// Uses an already built chain.
    pub fn from_chain(chain: Chain<Delivery<T>>) -> Self {
        Self { chain }
    }

    /// Stops the chain's worker pools.
    pub fn shutdown(&self) {
        self.chain.shutdown();
    }
}

#[async_trait]
impl<T> Publish<T> for ChainPublisher<T>
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let chain = self.chain.handler();
        let results = join_all(handlers.iter().map(|handler| {
            let delivery = Arc::new(Delivery {
                message: Arc::clone(&message),
                handler: Arc::clone(handler),
            });
            invoke_guarded(&chain, delivery, ctx.clone())
        }))
        .await;
        HandlerError::collect(results)
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
