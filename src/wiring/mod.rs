//! # Declarative decorator wiring.
//!
//! Builds chains from configuration instead of code. A [`DecoratorTable`] maps
//! decorator names to constructor functions; a [`WireUp`] is a list of
//! `{ "decorator": name, ...options }` entries, applied to a builder in order.
//!
//! ```text
//! JSON ──► WireUp::from_json ──► [WireEntry] ──► for each: table[name](builder, options) ──► ChainBuilder
//! ```
//!
//! ## Built-in entries
//! | Name | Options |
//! |---|---|
//! | `Concurrent` | `limit` (0 or absent: default pool size) |
//! | `Retry` | `max_attempts`, `delay_ms` (default 100) |
//! | `FireAndForget` | none |
//! | `Traced` | `name` |
//! | `NoDuplicates` | `key`: name of a registered key selector |
//! | `Distinct` | `key`: name of a registered key selector |
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), chainbus::BuildError> {
//! use chainbus::{Bus, ChainBuilder, DecoratorTable, WireUp};
//!
//! #[derive(Debug)]
//! struct Order { id: u64 }
//!
//! let mut table = DecoratorTable::<Order>::with_builtins();
//! table.key_selector("order_id", |o: &Order| o.id.to_string());
//!
//! let wiring = WireUp::from_json(r#"[
//!     { "decorator": "Distinct", "key": "order_id" },
//!     { "decorator": "Concurrent", "limit": 4 }
//! ]"#)?;
//!
//! let plan = wiring
//!     .apply(ChainBuilder::new(), &table)?
//!     .handler_sync(|o: &Order| println!("{o:?}"));
//!
//! let bus = Bus::<Order>::new();
//! let _sub = bus.subscribe_plan(plan)?;
//! # Ok(())
//! # }
//! ```

mod table;
mod wire_up;

pub use table::{Constructor, DecoratorTable, KeySelector};
pub use wire_up::{WireEntry, WireUp};
