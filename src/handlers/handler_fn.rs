//! # Closure-backed handlers.
//!
//! [`handler_fn`] wraps `F: Fn(Arc<T>, CancellationToken) -> Fut`, producing a fresh
//! future per message. No state is shared between invocations unless the closure
//! captures it explicitly (e.g. an `Arc<AtomicUsize>`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use chainbus::{Handler, HandlerError, handler_fn};
//!
//! let h: Handler<String> = handler_fn(|msg: Arc<String>, ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Ok(());
//!     }
//!     let _ = msg.len();
//!     Ok::<_, HandlerError>(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::handler::{Handler, HandlerFuture};

/// Creates a [`Handler`] from an async closure.
pub fn handler_fn<T, F, Fut>(f: F) -> Handler<T>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
        Box::pin(f(message, ctx))
    })
}

/// Creates a [`Handler`] from a synchronous closure that cannot fail.
///
/// The closure runs inline when the handler is invoked; the returned future is
/// already complete.
pub fn sync_handler<T, F>(f: F) -> Handler<T>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |message: Arc<T>, _ctx: CancellationToken| -> HandlerFuture {
        f(&message);
        Box::pin(futures::future::ready(Ok(())))
    })
}
