//! Key and channel naming under a tenant prefix.
//!
//! Every key and channel the backplane touches is built here, so two
//! backplanes configured with different prefixes never see each other's
//! records or traffic.

use std::fmt;

/// Record namespaces owned by the backplane services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Agent records owned by the discovery service.
    Agent,
    /// Persisted envelopes owned by the message broker.
    Message,
    /// Context entry lists owned by the context manager.
    Context,
    /// Branch records owned by the context manager.
    Branch,
}

impl Namespace {
    /// Returns the namespace segment including its trailing separator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent:",
            Self::Message => "message:",
            Self::Context => "context:",
            Self::Branch => "branch:",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds prefixed store keys and channel names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Creates a key space rooted at `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the tenant prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the key for `id` in `namespace`.
    #[must_use]
    pub fn key(&self, namespace: Namespace, id: &str) -> String {
        format!("{}{}{id}", self.prefix, namespace.as_str())
    }

    /// Returns the prefix matching every key in `namespace`.
    #[must_use]
    pub fn scan(&self, namespace: Namespace) -> String {
        format!("{}{}", self.prefix, namespace.as_str())
    }

    /// Extracts the identifier from a key in `namespace`.
    ///
    /// Returns `None` when `key` does not belong to the namespace.
    #[must_use]
    pub fn id_from_key<'a>(&self, namespace: Namespace, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix(namespace.as_str())
    }

    /// Returns the prefixed name of a publish/subscribe channel.
    #[must_use]
    pub fn channel(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}
