//! Pruning policy applied by `prune` sync events.

use async_trait::async_trait;

use crate::context::domain::{ContextEntry, ContextId};

/// Decides which entries of a context survive a `prune` event.
///
/// The result is stored and published as an ordinary update.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextPruner: Send + Sync {
    /// Returns the entries of `context_id` to keep.
    async fn prune(&self, context_id: &ContextId, nodes: Vec<ContextEntry>) -> Vec<ContextEntry>;
}

/// Pruner that keeps every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainAll;

#[async_trait]
impl ContextPruner for RetainAll {
    async fn prune(&self, _context_id: &ContextId, nodes: Vec<ContextEntry>) -> Vec<ContextEntry> {
        nodes
    }
}
