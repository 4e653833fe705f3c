//! # Bus registry - one bus per message type, owned by the application.
//!
//! [`BusRegistry`] replaces a process-wide singleton: the application creates one at
//! startup and passes it (or an `Arc` of it) to whoever publishes or subscribes.
//!
//! ## Architecture
//! ```text
//! registry.bus::<T>()
//!     ├─► read lock ──► hit ──► clone Bus<T>
//!     └─► miss ──► write lock ──► re-check ──► Bus::with_config(&default_config) ──► insert
//! ```
//!
//! ## Rules
//! - Keyed by `TypeId`; at most one bus per message type.
//! - First access creates the bus with the registry's [`BusConfig`].
//! - [`insert`](BusRegistry::insert) pre-registers a bus built with another config
//!   or a custom publisher.
//! - Buses live as long as the registry; there is no removal.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::bus::Bus;
use crate::bus::config::BusConfig;

/// Registered bus plus its message type name for listings.
struct Entry {
    message: &'static str,
    bus: Box<dyn Any + Send + Sync>,
}

/// Explicit map from message type to its [`Bus`].
///
/// # Example
/// ```rust
/// use chainbus::{BusConfig, BusRegistry, PublishStrategy};
///
/// let registry = BusRegistry::new(BusConfig::with_strategy(PublishStrategy::Serial));
///
/// let a = registry.bus::<u32>();
/// let b = registry.bus::<u32>();
/// let _sub = a.subscribe_sync(|_n: &u32| {});
///
/// assert_eq!(b.subscriber_count(), 1);
/// assert_eq!(registry.len(), 1);
/// ```
pub struct BusRegistry {
    config: BusConfig,
    buses: RwLock<HashMap<TypeId, Entry>>,
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl std::fmt::Debug for BusRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusRegistry")
            .field("config", &self.config)
            .field("messages", &self.list())
            .finish()
    }
}

impl BusRegistry {
    /// Creates an empty registry; lazily created buses use `config`.
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            buses: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the bus for `T`, creating it on first access.
    pub fn bus<T>(&self) -> Bus<T>
    where
        T: Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();
        {
            let buses = self.buses.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bus) = buses.get(&key).and_then(|e| e.bus.downcast_ref::<Bus<T>>()) {
                return bus.clone();
            }
        }

        let mut buses = self.buses.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(bus) = buses.get(&key).and_then(|e| e.bus.downcast_ref::<Bus<T>>()) {
            return bus.clone();
        }
        let bus = Bus::<T>::with_config(&self.config);
        buses.insert(
            key,
            Entry {
                message: type_name::<T>(),
                bus: Box::new(bus.clone()),
            },
        );
        bus
    }

    /// Registers `bus` for `T`. Returns `false` (and keeps the existing bus) if one
    /// is already registered.
    pub fn insert<T>(&self, bus: Bus<T>) -> bool
    where
        T: Send + Sync + 'static,
    {
        let mut buses = self.buses.write().unwrap_or_else(PoisonError::into_inner);
        if buses.contains_key(&TypeId::of::<T>()) {
            return false;
        }
        buses.insert(
            TypeId::of::<T>(),
            Entry {
                message: type_name::<T>(),
                bus: Box::new(bus),
            },
        );
        true
    }

    /// True if a bus for `T` exists.
    pub fn contains<T: 'static>(&self) -> bool {
        self.buses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    /// Returns sorted message type names of registered buses.
    pub fn list(&self) -> Vec<&'static str> {
        let buses = self.buses.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&'static str> = buses.values().map(|e| e.message).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered buses.
    pub fn len(&self) -> usize {
        self.buses.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if no bus was created or inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
