//! # Serial publish strategy.
//!
//! Handlers run one at a time in snapshot order; the first failure ends the publish.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::invoke_guarded;
use crate::publishers::{Publish, Snapshot};

/// Invokes handlers one at a time in snapshot order.
///
/// Each handler completes before the next starts. The first failure aborts the
/// remaining handlers and is returned.
#[derive(Clone, Copy, Debug, Default)]
pub struct Serial;

#[async_trait]
impl<T> Publish<T> for Serial
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        handlers: Snapshot<T>,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        for handler in handlers.iter() {
            invoke_guarded(handler, Arc::clone(&message), ctx.clone()).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::handlers::{Handler, handler_fn};

    fn step(log: &Arc<Mutex<Vec<usize>>>, n: usize, fail: bool) -> Handler<u8> {
        let log = Arc::clone(log);
        handler_fn(move |_m: Arc<u8>, _c| {
            let log = Arc::clone(&log);
            async move {
                tokio::task::yield_now().await;
                log.lock().unwrap().push(n);
                if fail {
                    Err(HandlerError::fail(format!("step {n}")))
                } else {
                    Ok(())
                }
            }
        })
    }

    #[tokio::test]
    async fn runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = Arc::new((1..=4).map(|n| step(&log, n, false)).collect::<Vec<_>>());

        Serial
            .publish(handlers, Arc::new(0), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = Arc::new(vec![
            step(&log, 1, false),
            step(&log, 2, true),
            step(&log, 3, false),
        ]);

        let res = Serial
            .publish(handlers, Arc::new(0), CancellationToken::new())
            .await;
        assert_eq!(res, Err(HandlerError::fail("step 2")));
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }
}
