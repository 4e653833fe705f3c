use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::chain::ChainBuilder;
use crate::decorators::RetryConfig;
use crate::error::BuildError;

/// Named key selector usable by key-based entries.
pub type KeySelector<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Applies one decorator entry to a builder, reading its options.
pub type Constructor<T> = Arc<
    dyn Fn(
            ChainBuilder<T>,
            &Map<String, Value>,
            &DecoratorTable<T>,
        ) -> Result<ChainBuilder<T>, BuildError>
        + Send
        + Sync,
>;

/// Registration table consulted by [`WireUp`](crate::WireUp).
pub struct DecoratorTable<T> {
    constructors: HashMap<String, Constructor<T>>,
    keys: HashMap<String, KeySelector<T>>,
}

impl<T> fmt::Debug for DecoratorTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decorators: Vec<&String> = self.constructors.keys().collect();
        decorators.sort();
        let mut keys: Vec<&String> = self.keys.keys().collect();
        keys.sort();
        f.debug_struct("DecoratorTable")
            .field("decorators", &decorators)
            .field("keys", &keys)
            .finish()
    }
}

#[derive(Deserialize)]
struct ConcurrentOptions {
    #[serde(default)]
    limit: usize,
}

#[derive(Deserialize)]
struct RetryOptions {
    max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    100
}

#[derive(Deserialize)]
struct TracedOptions {
    name: String,
}

#[derive(Deserialize)]
struct KeyOptions {
    key: Option<String>,
}

/// Deserializes an entry's options into `O`.
fn options<O>(decorator: &str, options: &Map<String, Value>) -> Result<O, BuildError>
where
    O: DeserializeOwned,
{
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| BuildError::InvalidConfig {
        decorator: decorator.to_string(),
        reason: e.to_string(),
    })
}

impl<T> DecoratorTable<T>
where
    T: Send + Sync + 'static,
{
    /// Empty table.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            keys: HashMap::new(),
        }
    }

    /// Table with the built-in decorators registered.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table
            .register("Concurrent", |b, opts, _| {
                let o: ConcurrentOptions = options("Concurrent", opts)?;
                Ok(b.concurrent(o.limit))
            })
            .register("Retry", |b, opts, _| {
                let o: RetryOptions = options("Retry", opts)?;
                let config =
                    RetryConfig::new(o.max_attempts).delay(Duration::from_millis(o.delay_ms));
                Ok(b.retry(config))
            })
            .register("FireAndForget", |b, _, _| Ok(b.fire_and_forget()))
            .register("Traced", |b, opts, _| {
                let o: TracedOptions = options("Traced", opts)?;
                Ok(b.traced(o.name))
            })
            .register("NoDuplicates", |b, opts, table| {
                let key = table.resolve_key("NoDuplicates", opts)?;
                Ok(b.no_duplicates(move |m: &T| key(m)))
            })
            .register("Distinct", |b, opts, table| {
                let key = table.resolve_key("Distinct", opts)?;
                Ok(b.distinct(move |m: &T| key(m)))
            });
        table
    }

    /// Registers (or replaces) a decorator constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(
                ChainBuilder<T>,
                &Map<String, Value>,
                &DecoratorTable<T>,
            ) -> Result<ChainBuilder<T>, BuildError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Registers (or replaces) a named key selector.
    pub fn key_selector<F>(&mut self, name: impl Into<String>, selector: F) -> &mut Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.keys.insert(name.into(), Arc::new(selector));
        self
    }

    /// Looks up a decorator constructor.
    pub fn constructor(&self, name: &str) -> Result<Constructor<T>, BuildError> {
        self.constructors
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::UnknownDecorator {
                name: name.to_string(),
            })
    }

    /// Resolves the `key` option of a key-based entry to a registered selector.
    pub fn resolve_key(
        &self,
        decorator: &str,
        opts: &Map<String, Value>,
    ) -> Result<KeySelector<T>, BuildError> {
        let o: KeyOptions = options(decorator, opts)?;
        o.key
            .and_then(|name| self.keys.get(&name).cloned())
            .ok_or_else(|| BuildError::KeySelectorMissing {
                decorator: decorator.to_string(),
            })
    }
}

impl<T> Default for DecoratorTable<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::with_builtins()
    }
}
