//! # Handler chains.
//!
//! A chain wraps a terminal handler with decorators. Every decorator has the same
//! invocation signature as the handler it wraps, so decorators nest in any order.
//!
//! ## Two-phase protocol
//! ```text
//! configuration (mutable, by value)          build (frozen)
//! ChainBuilder::new()
//!   .filter(..)          ─┐
//!   .concurrent(4)        ├─► ChainPlan ──► build() ──► Chain { handler, context }
//!   .retry(..)            │                 (decorators instantiated innermost-first,
//!   .handler(..)         ─┘                  configuration errors surface here)
//! ```
//!
//! The first decorator added is the outermost one: it sees each message first.

mod builder;
mod context;

pub use builder::{Chain, ChainBuilder, ChainPlan};
pub use context::{ChainContext, SubscriptionSlot};
