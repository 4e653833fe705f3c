//! # Parallel publish strategies.
//!
//! - [`Parallel`]: every handler is invoked on the publishing task and awaited together.
//! - [`ForcedParallel`]: every handler is spawned onto its own tokio task first, so
//!   synchronous handlers never block the publisher.
//!
//! Both wait for all handlers before reporting failures.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::invoke_guarded;
use crate::publishers::{Publish, Snapshot};

/// Invokes every handler concurrently on the publishing task and waits for all of them.
///
/// Failures are collected after every handler completed: one failure is returned
/// as-is, several as [`HandlerError::Aggregate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Parallel;

#[async_trait]
impl<T> Publish<T> for Parallel
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let results = join_all(
            handlers
                .iter()
                .map(|h| invoke_guarded(h, Arc::clone(&message), ctx.clone())),
        )
        .await;
        HandlerError::collect(results)
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

/// Dispatches every handler onto its own tokio task, then waits for all of them.
///
/// Synchronous handlers never run inline on the publisher. Same failure policy as
/// [`Parallel`]; a panicking handler is reported as [`HandlerError::Panicked`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ForcedParallel;

#[async_trait]
impl<T> Publish<T> for ForcedParallel
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let joins = handlers.iter().map(|h| {
            let h = Arc::clone(h);
            let message = Arc::clone(&message);
            let ctx = ctx.clone();
            tokio::spawn(async move { invoke_guarded(&h, message, ctx).await })
        });
        let results = join_all(joins).await.into_iter().map(|joined| match joined {
            Ok(res) => res,
            Err(e) => Err(HandlerError::Panicked {
                info: e.to_string(),
            }),
        });
        HandlerError::collect(results)
    }

    fn name(&self) -> &'static str {
        "forced_parallel"
    }
}
