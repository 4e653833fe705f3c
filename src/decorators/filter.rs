//! # Predicate and type-narrowing filters.
//!
//! A message that does not pass completes immediately with `Ok(())`; nothing
//! downstream runs.

use std::sync::Arc;

use futures::future::ready;
use tokio_util::sync::CancellationToken;

use crate::chain::ChainBuilder;
use crate::handlers::{Handler, HandlerFuture};

/// Narrowing from a broad message type to one of its variants.
///
/// Implement it on a bus's message enum for each variant payload that handlers
/// want to subscribe to directly.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use chainbus::Narrow;
///
/// struct Created { id: u64 }
/// struct Deleted { id: u64 }
///
/// enum Event {
///     Created(Arc<Created>),
///     Deleted(Arc<Deleted>),
/// }
///
/// impl Narrow<Created> for Event {
///     fn narrow(message: &Arc<Self>) -> Option<Arc<Created>> {
///         match message.as_ref() {
///             Event::Created(c) => Some(Arc::clone(c)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Narrow<U>: Sized {
    /// Returns the narrowed message, or `None` if this message is something else.
    fn narrow(message: &Arc<Self>) -> Option<Arc<U>>;
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Forwards only messages for which `predicate` returns `true`.
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.add(move |inner: Handler<T>, _ctx| {
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    if predicate(&message) {
                        inner(message, ctx)
                    } else {
                        Box::pin(ready(Ok(())))
                    }
                });
            Ok(wrapped)
        })
    }

    /// Forwards only messages of variant `U`, narrowed via [`Narrow`].
    pub fn of_type<U>(self) -> ChainBuilder<In, U>
    where
        T: Narrow<U>,
        U: Send + Sync + 'static,
    {
        self.narrow_with(<T as Narrow<U>>::narrow)
    }

    /// Forwards only messages `narrow` maps to `Some`, passing on the narrowed value.
    pub fn narrow_with<U, F>(self, narrow: F) -> ChainBuilder<In, U>
    where
        U: Send + Sync + 'static,
        F: Fn(&Arc<T>) -> Option<Arc<U>> + Send + Sync + 'static,
    {
        self.map(move |inner: Handler<U>, _ctx| {
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    match narrow(&message) {
                        Some(narrowed) => inner(narrowed, ctx),
                        None => Box::pin(ready(Ok(()))),
                    }
                });
            Ok(wrapped)
        })
    }
}
