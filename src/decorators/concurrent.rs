//! # Bounded-concurrency worker pool.
//!
//! `concurrent(n)` caps how many invocations of the wrapped handler run at once,
//! whatever the publish strategy, while each caller still awaits its own message's
//! outcome.
//!
//! ## Architecture
//! ```text
//! handle(msg) ──► lock ──► queue.push_back(Job { msg, done: oneshot })
//!                 admission.add_permits(1)
//!                 return done.await
//!
//! worker 1..N:  loop {
//!                 select! {
//!                   shutdown.cancelled() ──► stop
//!                   admission.acquire()  ──► pop job ──► inner(msg) ──► done.send(result)
//!                 }
//!               }
//! ```
//!
//! ## Rules
//! - At most N inner invocations run at the same time.
//! - Completion order may differ from enqueue order (workers race).
//! - Every accepted message is resolved exactly once: with the handler's result, or
//!   with [`HandlerError::Shutdown`] if the pool stopped before the message ran.
//! - After shutdown new messages fail fast with [`HandlerError::Shutdown`]; a
//!   running invocation completes.
//! - Workers stop when the chain is disposed or when the last copy of the
//!   decorated handler is dropped.
//! - A panicking handler fails only its own message; the worker keeps running.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::chain::ChainBuilder;
use crate::error::{BuildError, HandlerError};
use crate::handlers::{Handler, HandlerFuture, invoke_guarded};

/// Queued message with its completion sender.
struct Job<T> {
    message: Arc<T>,
    ctx: CancellationToken,
    done: oneshot::Sender<Result<(), HandlerError>>,
}

struct Queue<T> {
    closed: bool,
    pending: VecDeque<Job<T>>,
}

struct WorkerPool<T> {
    queue: Mutex<Queue<T>>,
    admission: Semaphore,
}

impl<T> WorkerPool<T> {
    fn lock(&self) -> MutexGuard<'_, Queue<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(
        &self,
        message: Arc<T>,
        ctx: CancellationToken,
    ) -> Result<oneshot::Receiver<Result<(), HandlerError>>, HandlerError> {
        let (done, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            if queue.closed {
                return Err(HandlerError::Shutdown);
            }
            queue.pending.push_back(Job { message, ctx, done });
        }
        self.admission.add_permits(1);
        Ok(rx)
    }

    /// Rejects further submissions and hands back what was still queued.
    fn close(&self) -> VecDeque<Job<T>> {
        let mut queue = self.lock();
        queue.closed = true;
        std::mem::take(&mut queue.pending)
    }
}

/// Default worker count: twice the available parallelism.
pub(crate) fn default_concurrency() -> usize {
    2 * std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

async fn worker_loop<T>(
    worker: usize,
    pool: Arc<WorkerPool<T>>,
    inner: Handler<T>,
    shutdown: CancellationToken,
) where
    T: Send + Sync + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = pool.admission.acquire() => {
                match permit {
                    Ok(permit) => permit.forget(),
                    Err(_) => break,
                }
                let Some(job) = pool.lock().pending.pop_front() else {
                    continue;
                };
                let res = invoke_guarded(&inner, job.message, job.ctx).await;
                if let Err(e) = &res {
                    trace!(worker, error = %e, "pooled invocation failed");
                }
                let _ = job.done.send(res);
            }
        }
    }

    let abandoned = pool.close();
    if !abandoned.is_empty() {
        debug!(worker, abandoned = abandoned.len(), "worker pool stopped with queued messages");
    }
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Runs the rest of the chain on a pool of `limit` workers.
    ///
    /// `limit == 0` selects the default: twice the number of available CPUs.
    /// Building the chain requires a tokio runtime ([`BuildError::NoRuntime`] otherwise).
    pub fn concurrent(self, limit: usize) -> Self {
        self.add(move |inner: Handler<T>, ctx| {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime {
                decorator: "concurrent".into(),
            })?;
            let workers = if limit == 0 { default_concurrency() } else { limit };

            let pool = Arc::new(WorkerPool {
                queue: Mutex::new(Queue {
                    closed: false,
                    pending: VecDeque::new(),
                }),
                admission: Semaphore::new(0),
            });
            let shutdown = ctx.shutdown_token().child_token();
            for worker in 0..workers {
                runtime.spawn(worker_loop(
                    worker,
                    Arc::clone(&pool),
                    Arc::clone(&inner),
                    shutdown.clone(),
                ));
            }
            debug!(workers, "worker pool started");

            let stop_on_drop = Arc::new(shutdown.drop_guard());
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    let _alive = &stop_on_drop;
                    let submitted = pool.submit(message, ctx);
                    Box::pin(async move {
                        match submitted {
                            Ok(rx) => rx.await.unwrap_or(Err(HandlerError::Shutdown)),
                            Err(e) => Err(e),
                        }
                    })
                });
            Ok(wrapped)
        })
    }
}
