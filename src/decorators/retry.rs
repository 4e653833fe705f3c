//! # Retry decorator.
//!
//! Re-invokes the rest of the chain on failure, up to a maximum number of attempts,
//! sleeping between attempts per a [`BackoffPolicy`].
//!
//! ```text
//! attempt 1 ──► Err(e) ──► on_fail(msg, e, 1, max) ──► retryable? ──► sleep(backoff.next(0)) ──► attempt 2 ...
//!                                                       └─ no / last attempt / ctx cancelled ──► Err(e)
//! ```
//!
//! Non-retryable errors ([`HandlerError::is_retryable`] is `false`) are returned at
//! once. An aggregate of failures (for example from `branch_out`) is retried when every
//! failure in it is retryable. Cancelling the token interrupts the delay; the last
//! error is returned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chain::ChainBuilder;
use crate::error::{BuildError, HandlerError};
use crate::handlers::{Handler, HandlerFuture, invoke_guarded};
use crate::policies::BackoffPolicy;

/// Callback invoked after every failed attempt: `(message, error, attempt, max_attempts)`.
pub type RetryObserver<T> = Arc<dyn Fn(&T, &HandlerError, u32, u32) + Send + Sync>;

/// Retry settings.
pub struct RetryConfig<T> {
    /// Total attempts including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// Failed-attempt observer.
    pub on_fail: Option<RetryObserver<T>>,
}

impl<T> RetryConfig<T> {
    /// `max_attempts` attempts with the default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffPolicy::default(),
            on_fail: None,
        }
    }

    /// Constant delay between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.backoff = BackoffPolicy::constant(delay);
        self
    }

    /// Custom backoff.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Observes every failed attempt.
    pub fn on_fail<F>(mut self, observer: F) -> Self
    where
        F: Fn(&T, &HandlerError, u32, u32) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(observer));
        self
    }
}

impl<T> Clone for RetryConfig<T> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            on_fail: self.on_fail.clone(),
        }
    }
}

impl<T> fmt::Debug for RetryConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("on_fail", &self.on_fail.is_some())
            .finish()
    }
}

async fn run_with_retry<T>(
    inner: Handler<T>,
    config: RetryConfig<T>,
    message: Arc<T>,
    ctx: CancellationToken,
) -> Result<(), HandlerError>
where
    T: Send + Sync + 'static,
{
    let max = config.max_attempts;
    let mut attempt: u32 = 1;
    loop {
        let err = match invoke_guarded(&inner, Arc::clone(&message), ctx.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if let Some(observer) = &config.on_fail {
            observer(&message, &err, attempt, max);
        }
        if attempt >= max || !err.is_retryable() || ctx.is_cancelled() {
            return Err(err);
        }

        let delay = config.backoff.next(attempt - 1);
        debug!(
            attempt,
            max_attempts = max,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying"
        );
        tokio::select! {
            _ = ctx.cancelled() => return Err(err),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Retries failed invocations of the rest of the chain.
    ///
    /// `max_attempts == 0` is rejected at build time.
    pub fn retry(self, config: RetryConfig<T>) -> Self {
        self.add(move |inner: Handler<T>, _ctx| {
            if config.max_attempts == 0 {
                return Err(BuildError::InvalidConfig {
                    decorator: "retry".into(),
                    reason: "max_attempts must be at least 1".into(),
                });
            }
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    Box::pin(run_with_retry(
                        Arc::clone(&inner),
                        config.clone(),
                        message,
                        ctx,
                    ))
                });
            Ok(wrapped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Ready = futures::future::Ready<Result<(), HandlerError>>;

    fn flaky(
        calls: &Arc<AtomicU32>,
        succeed_on: u32,
    ) -> impl Fn(Arc<u8>, CancellationToken) -> Ready + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |_m, _c| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            futures::future::ready(if n >= succeed_on {
                Ok(())
            } else {
                Err(HandlerError::fail(format!("attempt {n}")))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&observed);

        let chain = ChainBuilder::<u8>::new()
            .retry(
                RetryConfig::new(5)
                    .delay(Duration::from_millis(100))
                    .on_fail(move |_m: &u8, e: &HandlerError, attempt, max| {
                        o.lock().unwrap().push((e.to_string(), attempt, max));
                    }),
            )
            .handler(flaky(&calls, 3))
            .build()
            .unwrap();

        chain.invoke(1, CancellationToken::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *observed.lock().unwrap(),
            vec![
                ("handler failed: attempt 1".to_string(), 1, 5),
                ("handler failed: attempt 2".to_string(), 2, 5),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let chain = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(3).delay(Duration::from_millis(10)))
            .handler(flaky(&calls, 100))
            .build()
            .unwrap();

        let res = chain.invoke(1, CancellationToken::new()).await;
        assert_eq!(res, Err(HandlerError::fail("attempt 3")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let chain = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(4).delay(Duration::from_millis(1)))
            .handler(move |_m: Arc<u8>, _ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::fatal("bad input")) }
            })
            .build()
            .unwrap();

        let res = chain.invoke(1, CancellationToken::new()).await;
        assert_eq!(res, Err(HandlerError::fatal("bad input")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let chain = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(10).delay(Duration::from_secs(3600)))
            .handler(flaky(&calls, 100))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            t.cancel();
        });

        let res = chain.invoke(1, token).await;
        assert_eq!(res, Err(HandlerError::fail("attempt 1")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_when_primary_and_branch_fail_together() {
        let primary = Arc::new(AtomicU32::new(0));
        let branch = Arc::new(AtomicU32::new(0));
        let b = Arc::clone(&branch);

        let chain = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(3).delay(Duration::from_millis(10)))
            .branch_out(move |branches| {
                branches.branch(|builder| builder.handler(flaky(&b, 3)));
            })
            .handler(flaky(&primary, 3))
            .build()
            .unwrap();

        chain.invoke(1, CancellationToken::new()).await.unwrap();

        assert_eq!(primary.load(Ordering::SeqCst), 3);
        assert_eq!(branch.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn aggregate_with_fatal_member_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let chain = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(3).delay(Duration::from_millis(10)))
            .branch_out(|branches| {
                branches.branch(|builder| {
                    builder.handler(|_m: Arc<u8>, _c| async { Err(HandlerError::fatal("bad")) })
                });
            })
            .handler(move |_m: Arc<u8>, _c| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::fail("flaky")) }
            })
            .build()
            .unwrap();

        let res = chain.invoke(1, CancellationToken::new()).await;
        assert!(matches!(res, Err(HandlerError::Aggregate { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_is_a_build_error() {
        let res = ChainBuilder::<u8>::new()
            .retry(RetryConfig::new(0))
            .handler_sync(|_m: &u8| {})
            .build();
        assert!(matches!(res, Err(BuildError::InvalidConfig { .. })));
    }
}
