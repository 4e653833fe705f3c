//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings a [`Bus`](crate::Bus) is constructed with.
//!
//! Config is used in two ways:
//! 1. **Direct construction**: `Bus::with_config(&config)`
//! 2. **Registry defaults**: every bus a [`BusRegistry`](crate::BusRegistry) creates on
//!    first access uses the registry's config.
//!
//! A fully custom strategy is installed with [`Bus::with_publisher`](crate::Bus::with_publisher)
//! instead.

use std::sync::Arc;

use crate::publishers::{FireAndForget, Publish, PublishStrategy};

/// Publish configuration of a bus.
///
/// ## Field semantics
/// - `strategy`: how handlers of one message are invoked (default: parallel)
/// - `detached`: wrap the strategy so `publish_async` returns before handlers finish
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "wiring", derive(serde::Deserialize))]
#[cfg_attr(feature = "wiring", serde(default))]
pub struct BusConfig {
    /// Publish strategy.
    pub strategy: PublishStrategy,

    /// Fire-and-forget publishing.
    ///
    /// Handler failures are logged, never returned to the publisher.
    pub detached: bool,
}

impl BusConfig {
    /// Config with the given strategy, awaited publishing.
    pub fn with_strategy(strategy: PublishStrategy) -> Self {
        Self {
            strategy,
            detached: false,
        }
    }

    /// Instantiates the configured publisher.
    pub fn publisher<T>(&self) -> Arc<dyn Publish<T>>
    where
        T: Send + Sync + 'static,
    {
        let publisher = self.strategy.publisher::<T>();
        if self.detached {
            Arc::new(FireAndForget::new(publisher))
        } else {
            publisher
        }
    }
}
