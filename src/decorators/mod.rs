//! # Built-in chain decorators.
//!
//! Each decorator is a [`ChainBuilder`](crate::ChainBuilder) method that wraps the rest
//! of the chain; the first one added runs outermost.
//!
//! | Method | Behavior |
//! |---|---|
//! | `filter(pred)` | skip messages failing `pred` |
//! | `of_type::<U>()`, `narrow_with(f)` | forward only one variant, narrowed |
//! | `concurrent(n)` | run on a pool of `n` workers |
//! | `retry(config)` | re-invoke on retryable failure with backoff |
//! | `distinct(key)` | drop repeated keys, permanently |
//! | `no_duplicates(key)` | drop keys already in flight |
//! | `branch_out(..)` | fan out to extra sub-chains |
//! | `fire_and_forget()` | detach the rest of the chain |
//! | `traced(name)` | log invocation outcomes |
//! | `weak_reference(&obj)` | terminal bound to a [`Weak`](std::sync::Weak) object |

mod branch;
mod concurrent;
mod dedup;
mod detach;
mod filter;
mod log;
mod retry;
mod weak;

pub use branch::BranchSet;
pub use dedup::{DefaultComparer, KeyComparer};
pub use filter::Narrow;
pub use retry::{RetryConfig, RetryObserver};
