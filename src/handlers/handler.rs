//! # Handler contract and object-backed handlers.
//!
//! A handler receives the message (shared as `Arc<T>`, never copied between
//! concurrent handlers) and a [`CancellationToken`]. Cancellation is advisory:
//! handlers should check it at their own suspension points and return early.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Future returned by every handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// # Shared invocation function.
///
/// Terminal handlers, decorators and bus subscriptions all have this shape, which is
/// what lets decorators nest in any order.
pub type Handler<T> = Arc<dyn Fn(Arc<T>, CancellationToken) -> HandlerFuture + Send + Sync>;

/// # Object-style message handler.
///
/// Implement it for types that own state and should be subscribed as a whole,
/// either strongly ([`ChainBuilder::handler_ref`](crate::ChainBuilder::handler_ref)) or
/// bound to the object's lifetime
/// ([`ChainBuilder::weak_reference`](crate::ChainBuilder::weak_reference)).
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use chainbus::{HandlerError, MessageHandler};
///
/// struct OrdersView;
///
/// #[async_trait]
/// impl MessageHandler<u64> for OrdersView {
///     async fn handle(&self, order: Arc<u64>, ctx: CancellationToken) -> Result<(), HandlerError> {
///         if ctx.is_cancelled() {
///             return Ok(());
///         }
///         let _ = order;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Handles one message.
    async fn handle(&self, message: Arc<T>, ctx: CancellationToken) -> Result<(), HandlerError>;
}

/// Wraps a shared handler object into a [`Handler`] that keeps the object alive.
pub fn from_object<T, H>(object: Arc<H>) -> Handler<T>
where
    T: Send + Sync + 'static,
    H: MessageHandler<T>,
{
    Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
        let object = Arc::clone(&object);
        Box::pin(async move { object.handle(message, ctx).await })
    })
}

/// Runs one invocation, converting a panic into [`HandlerError::Panicked`].
pub(crate) async fn invoke_guarded<T>(
    handler: &Handler<T>,
    message: Arc<T>,
    ctx: CancellationToken,
) -> Result<(), HandlerError> {
    let fut = std::panic::AssertUnwindSafe(async move { handler(message, ctx).await });
    match fut.catch_unwind().await {
        Ok(res) => res,
        Err(panic_err) => {
            let info = {
                let any = &*panic_err;
                if let Some(msg) = any.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = any.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                }
            };
            Err(HandlerError::Panicked { info })
        }
    }
}
