//! # Invocation tracing decorator.
//!
//! `traced(name)` logs the outcome of every invocation of the rest of the chain
//! through `tracing`:
//!
//! ```text
//! TRACE chain="orders" "invocation started"
//! DEBUG chain="orders" elapsed_ms=3 "invocation completed"
//! WARN  chain="orders" error="handler failed: db down" label="handler_failed" elapsed_ms=12 "invocation failed"
//! ```
//!
//! The library installs no subscriber; output depends on the application's setup.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::chain::ChainBuilder;
use crate::handlers::{Handler, HandlerFuture};

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Logs every invocation of the rest of the chain under `name`.
    pub fn traced(self, name: impl Into<String>) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        self.add(move |inner: Handler<T>, _ctx| {
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    let chain = Arc::clone(&name);
                    let fut = inner(message, ctx);
                    Box::pin(async move {
                        let started = Instant::now();
                        trace!(chain = %chain, "invocation started");
                        let res = fut.await;
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        match &res {
                            Ok(()) => debug!(chain = %chain, elapsed_ms, "invocation completed"),
                            Err(e) => warn!(
                                chain = %chain,
                                error = %e,
                                label = e.as_label(),
                                elapsed_ms,
                                "invocation failed"
                            ),
                        }
                        res
                    })
                });
            Ok(wrapped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::HandlerError;

    #[tokio::test]
    async fn passes_results_through() {
        let chain = ChainBuilder::<u8>::new()
            .traced("numbers")
            .handler(|m: Arc<u8>, _c| async move {
                if *m == 0 {
                    Err(HandlerError::fail("zero"))
                } else {
                    Ok(())
                }
            })
            .build()
            .unwrap();

        assert_eq!(chain.invoke(1, CancellationToken::new()).await, Ok(()));
        assert_eq!(
            chain.invoke(0, CancellationToken::new()).await,
            Err(HandlerError::fail("zero"))
        );
    }
}
