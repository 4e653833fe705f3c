//! # Single-receiver publish strategy.
//!
//! Exactly one handler per message, chosen by a [`Selector`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::{Handler, invoke_guarded};
use crate::publishers::{Publish, Snapshot};

/// Picks the receiving handler: returns an index into the snapshot, or `None` to skip.
pub type Selector<T> = Arc<dyn Fn(&[Handler<T>], &T) -> Option<usize> + Send + Sync>;

/// Routes each message to exactly one handler.
///
/// The default selector picks the first handler. An empty snapshot, a `None`
/// selection or an out-of-range index completes successfully without delivery.
/// Only the chosen handler's failure is surfaced.
pub struct SingleReceiver<T> {
    select: Selector<T>,
}

impl<T> SingleReceiver<T>
where
    T: Send + Sync + 'static,
{
    /// Always delivers to the first handler.
    pub fn new() -> Self {
        Self::with_selector(|handlers, _| (!handlers.is_empty()).then_some(0))
    }

    /// Delivers to the handler chosen by `select`.
    pub fn with_selector<F>(select: F) -> Self
    where
        F: Fn(&[Handler<T>], &T) -> Option<usize> + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
        }
    }
}

impl<T> Default for SingleReceiver<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SingleReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleReceiver").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Publish<T> for SingleReceiver<T>
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let chosen = (self.select)(&handlers, &message).and_then(|i| handlers.get(i));
        match chosen {
            Some(handler) => invoke_guarded(handler, message, ctx).await,
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "single_receiver"
    }
}
