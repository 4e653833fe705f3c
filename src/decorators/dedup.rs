//! # Key-based duplicate suppression.
//!
//! Both decorators derive a key from every message and drop messages whose key is
//! already known; a dropped message completes with `Ok(())`.
//!
//! - [`distinct`](ChainBuilder::distinct): a key is remembered for the lifetime of the
//!   chain, from the first delivery attempt on, whatever its outcome.
//! - [`no_duplicates`](ChainBuilder::no_duplicates): a key is held only while an
//!   invocation with that key is running. It is released when the invocation
//!   completes, fails, panics or is dropped.
//!
//! Key equality defaults to `Eq + Hash`; a [`KeyComparer`] customizes it.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, RandomState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::ready;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::chain::ChainBuilder;
use crate::handlers::{Handler, HandlerFuture};

/// Custom key equality for the dedup decorators.
///
/// `hash_key` must agree with `eq_key`: equal keys hash equally.
///
/// # Example
/// ```rust
/// use chainbus::KeyComparer;
///
/// struct CaseInsensitive;
///
/// impl KeyComparer<String> for CaseInsensitive {
///     fn hash_key(&self, key: &String) -> u64 {
///         key.to_ascii_lowercase().bytes().fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64))
///     }
///     fn eq_key(&self, a: &String, b: &String) -> bool {
///         a.eq_ignore_ascii_case(b)
///     }
/// }
/// ```
pub trait KeyComparer<K>: Send + Sync + 'static {
    /// Hash of `key`.
    fn hash_key(&self, key: &K) -> u64;
    /// Key equality.
    fn eq_key(&self, a: &K, b: &K) -> bool;
}

/// `Eq + Hash` comparison.
#[derive(Clone, Debug, Default)]
pub struct DefaultComparer {
    state: RandomState,
}

impl<K> KeyComparer<K> for DefaultComparer
where
    K: Eq + Hash,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.state.hash_one(key)
    }

    fn eq_key(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Hash-bucketed key set driven by a [`KeyComparer`].
struct KeySet<K: 'static> {
    comparer: Arc<dyn KeyComparer<K>>,
    buckets: Mutex<HashMap<u64, Vec<K>>>,
}

impl<K: 'static> KeySet<K> {
    fn new(comparer: Arc<dyn KeyComparer<K>>) -> Self {
        Self {
            comparer,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Vec<K>>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `key`; returns `false` if an equal key is present.
    fn insert(&self, key: K) -> bool {
        let hash = self.comparer.hash_key(&key);
        let mut buckets = self.lock();
        let bucket = buckets.entry(hash).or_default();
        if bucket.iter().any(|k| self.comparer.eq_key(k, &key)) {
            return false;
        }
        bucket.push(key);
        true
    }

    fn remove(&self, key: &K) {
        let hash = self.comparer.hash_key(key);
        let mut buckets = self.lock();
        if let Some(bucket) = buckets.get_mut(&hash) {
            bucket.retain(|k| !self.comparer.eq_key(k, key));
            if bucket.is_empty() {
                buckets.remove(&hash);
            }
        }
    }
}

/// Releases an in-flight key when the invocation ends, however it ends.
struct InFlight<K: 'static> {
    keys: Arc<KeySet<K>>,
    key: K,
}

impl<K: 'static> Drop for InFlight<K> {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

impl<In, T> ChainBuilder<In, T>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Drops a message while another message with an equal key is being handled.
    pub fn no_duplicates<K, F>(self, key: F) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.no_duplicates_with(key, DefaultComparer::default())
    }

    /// [`no_duplicates`](Self::no_duplicates) with custom key equality.
    pub fn no_duplicates_with<K, F, C>(self, key: F, comparer: C) -> Self
    where
        K: Clone + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
        C: KeyComparer<K>,
    {
        self.add(move |inner: Handler<T>, _ctx| {
            let keys = Arc::new(KeySet::new(Arc::new(comparer)));
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    let k = key(&message);
                    if !keys.insert(k.clone()) {
                        trace!("in-flight duplicate dropped");
                        return Box::pin(ready(Ok(())));
                    }
                    let guard = InFlight {
                        keys: Arc::clone(&keys),
                        key: k,
                    };
                    let fut = inner(message, ctx);
                    Box::pin(async move {
                        let _guard = guard;
                        fut.await
                    })
                });
            Ok(wrapped)
        })
    }

    /// Drops every message whose key was seen before.
    pub fn distinct<K, F>(self, key: F) -> Self
    where
        K: Eq + Hash + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.distinct_with(key, DefaultComparer::default())
    }

    /// [`distinct`](Self::distinct) with custom key equality.
    pub fn distinct_with<K, F, C>(self, key: F, comparer: C) -> Self
    where
        K: Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
        C: KeyComparer<K>,
    {
        self.add(move |inner: Handler<T>, _ctx| {
            let seen = KeySet::new(Arc::new(comparer));
            let wrapped: Handler<T> =
                Arc::new(move |message: Arc<T>, ctx: CancellationToken| -> HandlerFuture {
                    if seen.insert(key(&message)) {
                        inner(message, ctx)
                    } else {
                        trace!("repeated key dropped");
                        Box::pin(ready(Ok(())))
                    }
                });
            Ok(wrapped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::error::HandlerError;

    struct CaseInsensitive;

    impl KeyComparer<String> for CaseInsensitive {
        fn hash_key(&self, key: &String) -> u64 {
            key.len() as u64
        }
        fn eq_key(&self, a: &String, b: &String) -> bool {
            a.eq_ignore_ascii_case(b)
        }
    }

    fn counting(hits: &Arc<AtomicUsize>) -> impl Fn(&String) + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn distinct_suppresses_forever() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = ChainBuilder::<String>::new()
            .distinct(|s: &String| s.clone())
            .handler_sync(counting(&hits))
            .build()
            .unwrap();

        for s in ["a", "b", "a", "a", "c", "b"] {
            chain.invoke(s.to_string(), CancellationToken::new()).await.unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn distinct_uses_custom_comparer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let chain = ChainBuilder::<String>::new()
            .distinct_with(|s: &String| s.clone(), CaseInsensitive)
            .handler_sync(counting(&hits))
            .build()
            .unwrap();

        for s in ["Key", "KEY", "key", "other"] {
            chain.invoke(s.to_string(), CancellationToken::new()).await.unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_duplicates_only_while_in_flight() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let chain = ChainBuilder::<String>::new()
            .no_duplicates(|s: &String| s.clone())
            .handler(move |_m: Arc<String>, _ctx| {
                let h = Arc::clone(&h);
                async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HandlerError>(())
                }
            })
            .build()
            .unwrap();

        let (a, b) = tokio::join!(
            chain.invoke("x".to_string(), CancellationToken::new()),
            chain.invoke("x".to_string(), CancellationToken::new()),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        chain.invoke("x".to_string(), CancellationToken::new()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_duplicates_releases_key_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let chain = ChainBuilder::<String>::new()
            .no_duplicates(|s: &String| s.len())
            .handler(move |_m: Arc<String>, _ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::fail("nope")) }
            })
            .build()
            .unwrap();

        assert!(chain.invoke("ab".to_string(), CancellationToken::new()).await.is_err());
        assert!(chain.invoke("cd".to_string(), CancellationToken::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
