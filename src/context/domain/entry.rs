//! Context entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One opaque entry of a shared context.
///
/// The backplane stores entries verbatim and never inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextEntry(Value);

impl ContextEntry {
    /// Wraps a JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the wrapped value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }

    /// Unwraps the entry.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ContextEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
