//! # Disposable subscription handle.
//!
//! A [`Subscription`] wraps a single unsubscribe action. Disposal is guarded so the
//! action runs at most once no matter how many clones call
//! [`unsubscribe`](Subscription::unsubscribe), or from how many threads.
//!
//! Dropping a handle does **not** unsubscribe: a subscription whose handle was
//! discarded keeps delivering for the lifetime of the bus.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type UnsubscribeAction = Box<dyn FnOnce() + Send>;

/// Handle returned by every `subscribe*` call.
#[derive(Clone)]
pub struct Subscription {
    action: Arc<Mutex<Option<UnsubscribeAction>>>,
}

impl Subscription {
    pub(crate) fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// Removes the subscription. Idempotent.
    pub fn unsubscribe(&self) {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(action) = action {
            action();
        }
    }

    /// True until the first [`unsubscribe`](Self::unsubscribe).
    pub fn is_active(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
