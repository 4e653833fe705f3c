//! # Fire-and-forget decorator.
//!
//! Detaches the rest of the chain onto a background task; the caller sees success at once.

use std::sync::Arc;

use futures::future::ready;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::chain::ChainBuilder;
use crate::error::BuildError;
use crate::handlers::{Handler, HandlerFuture, invoke_guarded};

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Starts the rest of the chain on a background task and completes immediately.
    ///
    /// Failures of the detached invocation are logged at `warn` and never returned.
    /// Detached work runs on the runtime the chain was built in
    /// ([`BuildError::NoRuntime`] when built outside one).
    pub fn fire_and_forget(self) -> Self {
        self.add(|inner: Handler<T>, _ctx| {
            let runtime = Handle::try_current().map_err(|_| BuildError::NoRuntime {
                decorator: "fire_and_forget".into(),
            })?;
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    let inner = Arc::clone(&inner);
                    runtime.spawn(async move {
                        if let Err(e) = invoke_guarded(&inner, message, ctx).await {
                            warn!(error = %e, label = e.as_label(), "detached invocation failed");
                        }
                    });
                    Box::pin(ready(Ok(())))
                });
            Ok(wrapped)
        })
    }
}
