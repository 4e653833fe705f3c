//! # chainbus
//!
//! **Chainbus** is an in-process, typed publish/subscribe bus for async Rust.
//!
//! Producers publish messages of type `T` to a [`Bus<T>`]; independently registered
//! handlers consume them under a configurable publish strategy. Each subscription can
//! be a plain handler or a chain of decorators (bounded concurrency, retry,
//! deduplication, filtering, type narrowing, fan-out, weak-reference lifetime) built
//! with [`ChainBuilder`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   publish_async(msg, ctx)                 subscribe(handler) / subscribe_chain(|b| ..)
//!            │                                          │
//!            ▼                                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Bus<T>                                                           │
//! │  - Mutex<Subscriptions> (id -> handler, recycled ids)             │
//! │  - ArcSwap<Vec<Handler>> snapshot (rebuilt on every change)       │
//! │  - Arc<dyn Publish<T>> strategy                                   │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ snapshot.load_full()  (lock-free)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Publish strategy                                                 │
//! │  Parallel | ForcedParallel | Serial | SingleReceiver              │
//! │  FireAndForget(inner) | ChainPublisher(chain over Delivery<T>)    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ handler  │       │  chain   │       │  chain   │
//!   └──────────┘       │ filter   │       │ retry    │
//!                      │ concurrent ─► workers ─► terminal
//!                      │ terminal │       │ weak_reference
//!                      └──────────┘       └──────────┘
//! ```
//!
//! ### Chain lifecycle
//! ```text
//! ChainBuilder::new()                       configuration phase (mutable)
//!   ├─► .filter(..) / .concurrent(n) / .retry(..) / .branch_out(..) ...
//!   └─► .handler(..) | .handler_sync(..) | .handler_ref(..) | .weak_reference(..)
//!          │
//!          ▼ ChainPlan
//!       .build()                            decorators instantiated innermost-first
//!          │                                (workers spawned, config validated)
//!          ▼ Chain (immutable)
//!       bus.subscribe_plan / subscribe_chain
//!          │
//!          └─► Subscription::unsubscribe()  removes handler, stops worker pools
//! ```
//!
//! ## Features
//! | Area             | Description                                                  | Key types / traits                        |
//! |------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Bus**          | Subscription registry with lock-free publish snapshots.      | [`Bus`], [`Subscription`], [`BusRegistry`] |
//! | **Strategies**   | How one message reaches the handlers.                        | [`Publish`], [`PublishStrategy`]          |
//! | **Chains**       | Two-phase decorator pipelines.                               | [`ChainBuilder`], [`ChainPlan`], [`Chain`] |
//! | **Handlers**     | Closures or objects invoked with a message and a token.      | [`Handler`], [`MessageHandler`]           |
//! | **Policies**     | Retry delays.                                                | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Errors**       | Typed handler and build errors.                              | [`HandlerError`], [`BuildError`]          |
//! | **Configuration**| Strategy selection.                                          | [`BusConfig`]                             |
//!
//! ## Optional features
//! - `wiring` _(default)_: declarative decorator wiring from JSON ([`DecoratorTable`], [`WireUp`]).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use chainbus::{Bus, HandlerError, RetryConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::<u32>::new();
//!     let total = Arc::new(AtomicUsize::new(0));
//!
//!     let t = Arc::clone(&total);
//!     let sub = bus.subscribe_chain(|b| {
//!         b.filter(|n: &u32| *n > 0)
//!             .retry(RetryConfig::new(3).delay(Duration::from_millis(5)))
//!             .concurrent(2)
//!             .handler(move |n: Arc<u32>, ctx: CancellationToken| {
//!                 let t = Arc::clone(&t);
//!                 async move {
//!                     if ctx.is_cancelled() {
//!                         return Err(HandlerError::Canceled);
//!                     }
//!                     t.fetch_add(*n as usize, Ordering::SeqCst);
//!                     Ok(())
//!                 }
//!             })
//!     })?;
//!
//!     bus.publish_async(0, CancellationToken::new()).await?;
//!     bus.publish_async(5, CancellationToken::new()).await?;
//!     assert_eq!(total.load(Ordering::SeqCst), 5);
//!
//!     sub.unsubscribe();
//!     assert_eq!(bus.subscriber_count(), 0);
//!     Ok(())
//! }
//! ```
mod bus;
mod chain;
mod decorators;
mod error;
mod handlers;
mod policies;
mod publishers;

// ---- Public re-exports ----

pub use bus::{Bus, BusConfig, BusRegistry, Subscription};
pub use chain::{Chain, ChainBuilder, ChainContext, ChainPlan, SubscriptionSlot};
pub use decorators::{BranchSet, DefaultComparer, KeyComparer, Narrow, RetryConfig, RetryObserver};
pub use error::{BuildError, HandlerError};
pub use handlers::{Handler, HandlerFuture, MessageHandler, from_object, handler_fn, sync_handler};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use publishers::{
    ChainPublisher, Delivery, FireAndForget, ForcedParallel, Parallel, Publish, PublishStrategy,
    Selector, Serial, SingleReceiver, Snapshot,
};

// Optional: declarative decorator wiring.
// Enable with: `--features wiring` (on by default)
#[cfg(feature = "wiring")]
mod wiring;
#[cfg(feature = "wiring")]
pub use wiring::{Constructor, DecoratorTable, KeySelector, WireEntry, WireUp};
