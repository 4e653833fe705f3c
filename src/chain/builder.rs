//! # Chain builder and built chains.
//!
//! [`ChainBuilder<In, T>`] accumulates decorators for messages entering as `In` and
//! currently typed `T` (type-narrowing decorators change `T`). A terminal call
//! (`handler`, `handler_sync`, `handler_ref`, `weak_reference`, ...) ends the
//! configuration phase and yields a [`ChainPlan<In>`]; [`ChainPlan::build`] freezes it
//! into an immutable [`Chain<In>`].
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use tokio_util::sync::CancellationToken;
//! use chainbus::ChainBuilder;
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let s = Arc::clone(&seen);
//!
//! let chain = ChainBuilder::<u32>::new()
//!     .filter(|n: &u32| n % 2 == 0)
//!     .handler_sync(move |_n: &u32| {
//!         s.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .build()?;
//!
//! chain.invoke(1, CancellationToken::new()).await?;
//! chain.invoke(2, CancellationToken::new()).await?;
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chain::context::ChainContext;
use crate::error::{BuildError, HandlerError};
use crate::handlers::{Handler, MessageHandler, from_object, handler_fn, sync_handler};

type Link<In, T> =
    Box<dyn FnOnce(Handler<T>, &ChainContext) -> Result<Handler<In>, BuildError> + Send>;

type Finish<In> = Box<dyn FnOnce(&ChainContext) -> Result<Handler<In>, BuildError> + Send>;

/// Configuration phase of a chain.
///
/// Decorator methods (`filter`, `of_type`, `concurrent`, `retry`, `no_duplicates`,
/// `distinct`, `branch_out`, `fire_and_forget`, `traced`) are defined next to each
/// decorator; [`add`](Self::add) plugs in anything else.
pub struct ChainBuilder<In, T = In> {
    link: Link<In, T>,
}

impl<T> ChainBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Empty chain: the terminal handler receives messages unchanged.
    pub fn new() -> Self {
        Self {
            link: Box::new(|handler: Handler<T>, _ctx: &ChainContext| Ok::<_, BuildError>(handler)),
        }
    }
}

impl<T> Default for ChainBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Adds a decorator that keeps the message type.
    ///
    /// The factory receives the next-inner handler and must return a handler with the
    /// same signature. It runs once, at build time.
    pub fn add<D>(self, decorator: D) -> Self
    where
        D: FnOnce(Handler<T>, &ChainContext) -> Result<Handler<T>, BuildError> + Send + 'static,
    {
        self.map(decorator)
    }

    /// Adds a decorator whose inner handler takes a different message type `U`.
    pub fn map<U, D>(self, decorator: D) -> ChainBuilder<In, U>
    where
        U: Send + Sync + 'static,
        D: FnOnce(Handler<U>, &ChainContext) -> Result<Handler<T>, BuildError> + Send + 'static,
    {
        let outer = self.link;
        ChainBuilder {
            link: Box::new(move |inner: Handler<U>, ctx: &ChainContext| {
                let wrapped = decorator(inner, ctx)?;
                outer(wrapped, ctx)
            }),
        }
    }

    /// Terminates the chain with a prepared [`Handler`].
    pub fn terminal(self, handler: Handler<T>) -> ChainPlan<In> {
        self.terminal_with(move |_ctx| Ok(handler))
    }

    /// Terminates the chain with a handler created at build time.
    pub fn terminal_with<F>(self, make: F) -> ChainPlan<In>
    where
        F: FnOnce(&ChainContext) -> Result<Handler<T>, BuildError> + Send + 'static,
    {
        let link = self.link;
        ChainPlan {
            finish: Box::new(move |ctx: &ChainContext| {
                let terminal = make(ctx)?;
                link(terminal, ctx)
            }),
        }
    }

    /// Terminates the chain with an async closure.
    pub fn handler<F, Fut>(self, f: F) -> ChainPlan<In>
    where
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.terminal(handler_fn(f))
    }

    /// Terminates the chain with a synchronous closure.
    pub fn handler_sync<F>(self, f: F) -> ChainPlan<In>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.terminal(sync_handler(f))
    }

    /// Terminates the chain with a handler object, keeping it alive as long as the chain.
    pub fn handler_ref<H>(self, object: Arc<H>) -> ChainPlan<In>
    where
        H: MessageHandler<T>,
    {
        self.terminal(from_object(object))
    }
}

/// A fully configured chain that has not been instantiated yet.
pub struct ChainPlan<In> {
    finish: Finish<In>,
}

impl<In> ChainPlan<In>
where
    In: Send + Sync + 'static,
{
    /// Instantiates every decorator (innermost first) and freezes the chain.
    pub fn build(self) -> Result<Chain<In>, BuildError> {
        let context = ChainContext::new();
        let handler = (self.finish)(&context)?;
        Ok(Chain { handler, context })
    }

    /// Instantiates the chain inside an existing context (branch-out sub-chains).
    pub(crate) fn build_in(self, context: &ChainContext) -> Result<Handler<In>, BuildError> {
        (self.finish)(context)
    }
}

/// An immutable, built handler chain.
///
/// Cloning is cheap; clones share decorator state (queues, seen keys, workers).
pub struct Chain<In> {
    handler: Handler<In>,
    context: ChainContext,
}

impl<In> Clone for Chain<In> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            context: self.context.clone(),
        }
    }
}

impl<In> Chain<In>
where
    In: Send + Sync + 'static,
{
    /// The composed invocation function.
    pub fn handler(&self) -> Handler<In> {
        Arc::clone(&self.handler)
    }

    /// Build-time services of this chain.
    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    /// Runs one message through the chain.
    pub async fn invoke(
        &self,
        message: impl Into<Arc<In>>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        (self.handler)(message.into(), ctx).await
    }

    /// Disposes the chain: stops its worker pools and, if subscribed, unsubscribes it.
    ///
    /// Work already running completes; queued work resolves with [`HandlerError::Shutdown`].
    pub fn shutdown(&self) {
        self.context.shutdown_token().cancel();
        self.context.subscription().unsubscribe();
    }
}
