use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::chain::ChainBuilder;
use crate::error::BuildError;
use crate::wiring::DecoratorTable;

/// One configured decorator: its name plus free-form options.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireEntry {
    /// Name looked up in the [`DecoratorTable`].
    pub decorator: String,
    /// Remaining fields of the entry.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Ordered decorator configuration; the first entry becomes the outermost decorator.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct WireUp {
    /// Entries in application order.
    pub entries: Vec<WireEntry>,
}

impl WireUp {
    /// Parses a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidConfig {
            decorator: "wire_up".into(),
            reason: e.to_string(),
        })
    }

    /// Parses an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, BuildError> {
        serde_json::from_value(value).map_err(|e| BuildError::InvalidConfig {
            decorator: "wire_up".into(),
            reason: e.to_string(),
        })
    }

    /// Applies every entry to `builder`, in order.
    ///
    /// Unknown names fail with [`BuildError::UnknownDecorator`]; bad options with
    /// [`BuildError::InvalidConfig`] or [`BuildError::KeySelectorMissing`].
    pub fn apply<T>(
        &self,
        builder: ChainBuilder<T>,
        table: &DecoratorTable<T>,
    ) -> Result<ChainBuilder<T>, BuildError>
    where
        T: Send + Sync + 'static,
    {
        self.entries.iter().try_fold(builder, |builder, entry| {
            let construct = table.constructor(&entry.decorator)?;
            debug!(decorator = %entry.decorator, "wiring decorator");
            construct(builder, &entry.options, table)
        })
    }
}
