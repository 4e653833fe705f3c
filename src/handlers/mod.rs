//! # Handler abstractions.
//!
//! This module provides the invocation contract every subscription, decorator and
//! publish strategy shares:
//! - [`Handler`] - shared invocation function `(Arc<T>, CancellationToken) -> HandlerFuture`
//! - [`MessageHandler`] - trait for object-style handlers (used by strong and weak bindings)
//! - [`handler_fn`] / [`sync_handler`] - adapters from closures

mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerFuture, MessageHandler, from_object};
pub use handler_fn::{handler_fn, sync_handler};

pub(crate) use handler::invoke_guarded;
