//! Context branches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BranchId, ContextEntry, ContextId};

/// Isolated snapshot of a context for one target.
///
/// A branch only changes through syncs addressed to its own id; later
/// changes to the source context never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBranch {
    id: BranchId,
    source_id: ContextId,
    target_id: ContextId,
    nodes: Vec<ContextEntry>,
    created_at: DateTime<Utc>,
    last_sync: DateTime<Utc>,
}

impl ContextBranch {
    /// Creates a branch of `source_id` holding `nodes`.
    #[must_use]
    pub fn new(
        source_id: ContextId,
        target_id: ContextId,
        nodes: Vec<ContextEntry>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BranchId::derive(&source_id, &target_id, created_at),
            source_id,
            target_id,
            nodes,
            created_at,
            last_sync: created_at,
        }
    }

    /// Returns the branch id.
    #[must_use]
    pub const fn id(&self) -> &BranchId {
        &self.id
    }

    /// Returns the context the branch was taken from.
    #[must_use]
    pub const fn source_id(&self) -> &ContextId {
        &self.source_id
    }

    /// Returns the context the branch merges into.
    #[must_use]
    pub const fn target_id(&self) -> &ContextId {
        &self.target_id
    }

    /// Returns the branch entries.
    #[must_use]
    pub fn nodes(&self) -> &[ContextEntry] {
        &self.nodes
    }

    /// Returns when the branch was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the branch entries last changed.
    #[must_use]
    pub const fn last_sync(&self) -> DateTime<Utc> {
        self.last_sync
    }

    pub(crate) fn replace_nodes(&mut self, nodes: Vec<ContextEntry>, at: DateTime<Utc>) {
        self.nodes = nodes;
        self.last_sync = at;
    }
}
