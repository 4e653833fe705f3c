//! # Build-time services shared by the decorators of one chain.
//!
//! Every decorator factory receives the chain's [`ChainContext`]:
//! - `shutdown_token()` - cancelled when the chain is disposed; worker pools stop on it.
//! - `subscription()` - slot filled with the bus [`Subscription`] once the chain is
//!   subscribed, so a decorator can remove its own subscription later.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::bus::Subscription;

/// Late-bound reference to the subscription a chain ends up attached to.
///
/// Empty while the chain is only built, or when the chain is a branch-out sub-chain.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionSlot {
    inner: Arc<OnceLock<Subscription>>,
}

impl SubscriptionSlot {
    pub(crate) fn attach(&self, subscription: Subscription) {
        let _ = self.inner.set(subscription);
    }

    /// True once the owning chain has been subscribed to a bus.
    pub fn is_attached(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Unsubscribes the owning chain. Returns `false` if it was never attached.
    pub fn unsubscribe(&self) -> bool {
        match self.inner.get() {
            Some(subscription) => {
                subscription.unsubscribe();
                true
            }
            None => false,
        }
    }
}

/// Services available to decorator factories while a chain is built.
#[derive(Clone, Debug)]
pub struct ChainContext {
    shutdown: CancellationToken,
    subscription: SubscriptionSlot,
}

impl ChainContext {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            subscription: SubscriptionSlot::default(),
        }
    }

    /// Context for a branch-out sub-chain: stops with the parent, owns no subscription.
    pub(crate) fn branch(&self) -> Self {
        Self {
            shutdown: self.shutdown.child_token(),
            subscription: SubscriptionSlot::default(),
        }
    }

    /// Token cancelled when the chain is disposed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The subscription slot of this chain.
    pub fn subscription(&self) -> SubscriptionSlot {
        self.subscription.clone()
    }
}
