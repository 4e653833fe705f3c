//! # Subscription registry and publish entry point.
//!
//! - [`Bus`] - subscriptions for one message type plus the active publish strategy
//! - [`Subscription`] - idempotent disposal handle
//! - [`BusRegistry`] - explicit, application-owned map of one bus per message type
//! - [`BusConfig`] - publish strategy selection

mod core;
mod config;
mod registry;
mod subscription;

pub use self::core::Bus;
pub use config::BusConfig;
pub use registry::BusRegistry;
pub use subscription::Subscription;
