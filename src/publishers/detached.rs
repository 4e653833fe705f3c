//! # Fire-and-forget publish strategy.
//!
//! Wraps another strategy and detaches it from the publisher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::HandlerError;
use crate::publishers::{Publish, Snapshot};

/// Runs an inner strategy on a background task and returns immediately.
///
/// Failures never reach the publisher; they are logged at `warn`.
pub struct FireAndForget<T> {
    inner: Arc<dyn Publish<T>>,
}

impl<T> FireAndForget<T>
where
    T: Send + Sync + 'static,
{
    /// Detaches `inner`.
    pub fn new(inner: Arc<dyn Publish<T>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T> Publish<T> for FireAndForget<T>
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.publish(handlers, message, ctx).await {
                warn!(
                    publisher = inner.name(),
                    error = %e,
                    label = e.as_label(),
                    "detached delivery failed"
                );
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fire_and_forget"
    }
}
