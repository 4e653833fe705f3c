//! # Branch-out fan-out.
//!
//! `branch_out` runs extra sub-chains next to the rest of the chain. Every message
//! goes to the primary path and to each branch concurrently; the invocation
//! completes when all of them have.
//!
//! ```text
//!                 ┌─► primary (rest of chain) ─┐
//! msg ─► branch ──┼─► branch 1 sub-chain ──────┼─► join ─► collect failures
//!                 └─► branch N sub-chain ──────┘
//! ```
//!
//! Branches are registered in the configuration phase through [`BranchSet`]; they
//! are instantiated when the enclosing chain is built and stop with it.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainBuilder, ChainPlan};
use crate::error::HandlerError;
use crate::handlers::{Handler, HandlerFuture};

/// Registration surface for branch sub-chains.
pub struct BranchSet<T> {
    plans: Vec<ChainPlan<T>>,
}

impl<T> BranchSet<T>
where
    T: Send + Sync + 'static,
{
    /// Adds a branch configured on a fresh builder.
    pub fn branch<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(ChainBuilder<T>) -> ChainPlan<T>,
    {
        self.plans.push(configure(ChainBuilder::new()));
        self
    }

    /// Adds an already configured branch.
    pub fn add(&mut self, plan: ChainPlan<T>) -> &mut Self {
        self.plans.push(plan);
        self
    }

    /// Number of registered branches.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// True if no branch is registered.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Fans every message out to the branches registered by `configure`, in addition
    /// to the rest of the chain.
    ///
    /// Failures of the primary path and the branches are combined: one failure is
    /// returned as-is, several as [`HandlerError::Aggregate`].
    ///
    /// # Example
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use tokio_util::sync::CancellationToken;
    /// use chainbus::ChainBuilder;
    ///
    /// let chain = ChainBuilder::<u32>::new()
    ///     .branch_out(|branches| {
    ///         branches
    ///             .branch(|b| b.filter(|n: &u32| *n > 100).handler_sync(|n: &u32| println!("large {n}")))
    ///             .branch(|b| b.handler_sync(|n: &u32| println!("audit {n}")));
    ///     })
    ///     .handler_sync(|n: &u32| println!("primary {n}"))
    ///     .build()?;
    ///
    /// chain.invoke(500, CancellationToken::new()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn branch_out<F>(self, configure: F) -> Self
    where
        F: FnOnce(&mut BranchSet<T>),
    {
        let mut set = BranchSet { plans: Vec::new() };
        configure(&mut set);
        let plans = set.plans;

        self.add(move |primary: Handler<T>, ctx| {
            let mut targets = Vec::with_capacity(plans.len() + 1);
            targets.push(primary);
            for plan in plans {
                targets.push(plan.build_in(&ctx.branch())?);
            }
            let targets = Arc::new(targets);

            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    let calls: Vec<HandlerFuture> = targets
                        .iter()
                        .map(|target| target(Arc::clone(&message), ctx.clone()))
                        .collect();
                    Box::pin(async move { HandlerError::collect(join_all(calls).await) })
                });
            Ok(wrapped)
        })
    }
}
