//! # Typed message bus.
//!
//! [`Bus<T>`] owns the live subscriptions for one message type and the publish
//! strategy used to deliver to them.
//!
//! ## Architecture
//! ```text
//! subscribe(handler) ──► lock registry ──► insert ──► rebuild snapshot ──► Subscription
//!                          (narrow mutex)              (ArcSwap store)
//!
//! publish_async(msg) ──► snapshot.load_full() ──► Publish::publish(snapshot, msg, ctx)
//!                          (lock-free)               ├─ Parallel / ForcedParallel
//!                                                    ├─ Serial
//!                                                    ├─ SingleReceiver
//!                                                    └─ FireAndForget(inner)
//! ```
//!
//! ## Rules
//! - A publish in flight iterates one immutable snapshot; concurrent subscribe /
//!   unsubscribe replaces the snapshot, never mutates it.
//! - Subscription ids are recycled: freed ids are reused before new ones are minted,
//!   and freeing the most recently minted id shrinks the counter instead.
//! - [`subscriber_count`](Bus::subscriber_count) is advisory under concurrent modification.
//! - Snapshots list handlers in ascending subscription-id order.
//! - A [`Subscription`] only ever affects the bus that issued it.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwap;
use tokio::runtime::{self, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::bus::config::BusConfig;
use crate::bus::subscription::Subscription;
use crate::chain::{ChainBuilder, ChainPlan};
use crate::error::{BuildError, HandlerError};
use crate::handlers::{Handler, HandlerFuture, MessageHandler, handler_fn, sync_handler};
use crate::publishers::{Publish, Snapshot};

/// Subscriptions keyed by id plus the id allocator.
struct Subscriptions<T> {
    next_id: u64,
    recycled: VecDeque<u64>,
    handlers: BTreeMap<u64, Handler<T>>,
}

impl<T> Subscriptions<T> {
    fn allocate_id(&mut self) -> u64 {
        if let Some(id) = self.recycled.pop_front() {
            return id;
        }
        self.next_id += 1;
        self.next_id
    }

    /// Removes `id`; returns `false` if it was not live.
    fn release(&mut self, id: u64) -> bool {
        if self.handlers.remove(&id).is_none() {
            return false;
        }
        if id == self.next_id {
            self.next_id -= 1;
        } else {
            self.recycled.push_back(id);
        }
        true
    }

    fn snapshot(&self) -> Snapshot<T> {
        Arc::new(self.handlers.values().cloned().collect())
    }
}

struct BusInner<T> {
    subscriptions: Mutex<Subscriptions<T>>,
    snapshot: ArcSwap<Vec<Handler<T>>>,
    publisher: Arc<dyn Publish<T>>,
}

impl<T> BusInner<T> {
    fn lock(&self) -> MutexGuard<'_, Subscriptions<T>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, handler: Handler<T>) -> u64 {
        let mut subs = self.lock();
        let id = subs.allocate_id();
        subs.handlers.insert(id, handler);
        self.snapshot.store(subs.snapshot());
        id
    }

    fn remove(&self, id: u64) {
        let mut subs = self.lock();
        if subs.release(id) {
            self.snapshot.store(subs.snapshot());
            drop(subs);
            debug!(subscription_id = id, "unsubscribed");
        }
    }
}

/// Subscription registry and publish entry point for messages of type `T`.
///
/// Cheap to clone; clones share subscriptions.
///
/// # Example
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), chainbus::HandlerError> {
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tokio_util::sync::CancellationToken;
/// use chainbus::Bus;
///
/// let bus = Bus::<u32>::new();
/// let total = Arc::new(AtomicUsize::new(0));
/// let t = Arc::clone(&total);
///
/// let sub = bus.subscribe_sync(move |n: &u32| {
///     t.fetch_add(*n as usize, Ordering::SeqCst);
/// });
///
/// bus.publish_async(5, CancellationToken::new()).await?;
/// sub.unsubscribe();
/// bus.publish_async(5, CancellationToken::new()).await?;
///
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// # Ok(())
/// # }
/// ```
pub struct Bus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("message", &std::any::type_name::<T>())
            .field("subscribers", &self.inner.snapshot.load().len())
            .field("publisher", &self.inner.publisher.name())
            .finish()
    }
}

impl<T> Default for Bus<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Bus<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a bus using the parallel publish strategy.
    pub fn new() -> Self {
        Self::with_config(&BusConfig::default())
    }

    /// Creates a bus using the configured strategy.
    pub fn with_config(config: &BusConfig) -> Self {
        Self::with_publisher(config.publisher())
    }

    /// Creates a bus with a custom publish strategy.
    pub fn with_publisher(publisher: Arc<dyn Publish<T>>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscriptions: Mutex::new(Subscriptions {
                    next_id: 0,
                    recycled: VecDeque::new(),
                    handlers: BTreeMap::new(),
                }),
                snapshot: ArcSwap::from_pointee(Vec::new()),
                publisher,
            }),
        }
    }

    /// Registers a handler. Always succeeds.
    pub fn subscribe(&self, handler: Handler<T>) -> Subscription {
        let id = self.inner.insert(handler);
        debug!(subscription_id = id, "subscribed");
        self.handle_for(id, None)
    }

    /// Registers an async closure.
    pub fn subscribe_fn<F, Fut>(&self, f: F) -> Subscription
    where
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe(handler_fn(f))
    }

    /// Registers a synchronous closure.
    pub fn subscribe_sync<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(sync_handler(f))
    }

    /// Registers a factory; every message is handled by a freshly created handler object.
    pub fn subscribe_factory<H, F>(&self, factory: F) -> Subscription
    where
        H: MessageHandler<T>,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
            let handler = factory();
            Box::pin(async move { handler.handle(message, ctx).await })
        }))
    }

    /// Builds a decorator chain and subscribes it.
    ///
    /// Configuration errors are returned before anything is registered. Disposing the
    /// returned subscription also stops the chain's worker pools.
    ///
    /// # Example
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use std::time::Duration;
    /// use chainbus::{Bus, RetryConfig};
    ///
    /// let bus = Bus::<String>::new();
    /// let sub = bus.subscribe_chain(|b| {
    ///     b.filter(|s: &String| !s.is_empty())
    ///         .retry(RetryConfig::new(3).delay(Duration::from_millis(10)))
    ///         .concurrent(4)
    ///         .handler_sync(|s: &String| println!("{s}"))
    /// })?;
    /// assert_eq!(bus.subscriber_count(), 1);
    /// sub.unsubscribe();
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_chain<F>(&self, configure: F) -> Result<Subscription, BuildError>
    where
        F: FnOnce(ChainBuilder<T>) -> ChainPlan<T>,
    {
        self.subscribe_plan(configure(ChainBuilder::new()))
    }

    /// Builds a configured chain plan and subscribes it.
    ///
    /// Same semantics as [`subscribe_chain`](Self::subscribe_chain), for plans assembled
    /// elsewhere (e.g. by declarative wiring).
    pub fn subscribe_plan(&self, plan: ChainPlan<T>) -> Result<Subscription, BuildError> {
        let chain = plan.build()?;
        let id = self.inner.insert(chain.handler());
        debug!(subscription_id = id, "subscribed chain");

        let context = chain.context();
        let subscription = self.handle_for(id, Some(context.shutdown_token()));
        context.subscription().attach(subscription.clone());
        Ok(subscription)
    }

    fn handle_for(&self, id: u64, shutdown: Option<CancellationToken>) -> Subscription {
        let bus: Weak<BusInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = bus.upgrade() {
                inner.remove(id);
            }
            if let Some(token) = shutdown {
                token.cancel();
            }
        })
    }

    /// Publishes a message and waits until the strategy's delivery guarantee is met.
    pub async fn publish_async(
        &self,
        message: impl Into<Arc<T>>,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        let handlers = self.inner.snapshot.load_full();
        trace!(
            subscribers = handlers.len(),
            publisher = self.inner.publisher.name(),
            "publishing"
        );
        self.inner
            .publisher
            .publish(handlers, message.into(), ctx)
            .await
    }

    /// Publishes without waiting; failures are logged.
    ///
    /// Inside a tokio runtime the publish runs on a spawned task. Outside one, the
    /// message is delivered on the calling thread through a temporary
    /// current-thread runtime, and `publish` returns once delivery completed.
    pub fn publish(&self, message: impl Into<Arc<T>>) {
        let bus = self.clone();
        let message = message.into();
        let delivery = async move {
            if let Err(e) = bus.publish_async(message, CancellationToken::new()).await {
                warn!(error = %e, label = e.as_label(), "detached publish failed");
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(delivery);
            }
            Err(_) => match runtime::Builder::new_current_thread().enable_time().build() {
                Ok(rt) => {
                    trace!("no tokio runtime, publishing on the calling thread");
                    rt.block_on(delivery);
                }
                Err(e) => warn!(error = %e, "publish dropped: cannot start a runtime"),
            },
        }
    }

    /// Current number of subscriptions (advisory).
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }
}
