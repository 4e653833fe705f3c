//! # Weak-reference lifetime binding.
//!
//! `weak_reference(&target)` terminates a chain with a handler object held through a
//! [`Weak`]: the subscription does not keep the object alive. Once the last strong
//! `Arc` is dropped, the next delivery removes the subscription from its bus and
//! completes with `Ok(())`.
//!
//! Cleanup is lazy: between the drop and the next publish the stale subscription is
//! still counted by [`Bus::subscriber_count`](crate::Bus::subscriber_count).

use std::sync::{Arc, Weak};

use futures::future::ready;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chain::{ChainBuilder, ChainPlan};
use crate::handlers::{Handler, HandlerFuture, MessageHandler};

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Terminates the chain with a handler object that is not kept alive by the chain.
    ///
    /// # Example
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use std::sync::Arc;
    /// use async_trait::async_trait;
    /// use tokio_util::sync::CancellationToken;
    /// use chainbus::{Bus, HandlerError, MessageHandler};
    ///
    /// struct Screen;
    ///
    /// #[async_trait]
    /// impl MessageHandler<String> for Screen {
    ///     async fn handle(&self, _m: Arc<String>, _c: CancellationToken) -> Result<(), HandlerError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let bus = Bus::<String>::new();
    /// let screen = Arc::new(Screen);
    /// bus.subscribe_chain(|b| b.weak_reference(&screen))?;
    ///
    /// drop(screen);
    /// assert_eq!(bus.subscriber_count(), 1);
    /// bus.publish_async("closed".to_string(), CancellationToken::new()).await?;
    /// assert_eq!(bus.subscriber_count(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn weak_reference<H>(self, target: &Arc<H>) -> ChainPlan<In>
    where
        H: MessageHandler<T>,
    {
        let target: Weak<H> = Arc::downgrade(target);
        self.terminal_with(move |ctx| {
            let slot = ctx.subscription();
            let handler: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    match target.upgrade() {
                        Some(object) => Box::pin(async move { object.handle(message, ctx).await }),
                        None => {
                            if slot.unsubscribe() {
                                debug!("weak handler target dropped, unsubscribed");
                            }
                            Box::pin(ready(Ok(())))
                        }
                    }
                });
            Ok(handler)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::Bus;
    use crate::error::HandlerError;

    struct Tally(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler<u8> for Tally {
        async fn handle(&self, _m: Arc<u8>, _c: CancellationToken) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_while_target_is_alive() {
        let hits = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(Tally(Arc::clone(&hits)));
        let chain = ChainBuilder::<u8>::new().weak_reference(&target).build().unwrap();

        chain.invoke(1, CancellationToken::new()).await.unwrap();
        chain.invoke(1, CancellationToken::new()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(Arc::strong_count(&target), 1);
    }

    #[tokio::test]
    async fn dropped_target_unsubscribes_on_next_publish() {
        let bus = Bus::<u8>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(Tally(Arc::clone(&hits)));
        let _sub = bus.subscribe_chain(|b| b.weak_reference(&target)).unwrap();

        bus.publish_async(1, CancellationToken::new()).await.unwrap();
        drop(target);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish_async(1, CancellationToken::new()).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn strong_reference_keeps_delivering() {
        let bus = Bus::<u8>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(Tally(Arc::clone(&hits)));
        let _sub = bus.subscribe_chain(|b| b.handler_ref(Arc::clone(&target))).unwrap();

        drop(target);
        bus.publish_async(1, CancellationToken::new()).await.unwrap();
        bus.publish_async(1, CancellationToken::new()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
