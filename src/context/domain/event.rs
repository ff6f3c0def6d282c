//! Sync events carried on the context channel.

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{ContextEntry, ContextId, InstanceId};
use crate::discovery::domain::AgentId;

/// Kind of change a sync event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    /// Replace the context entries.
    Update,
    /// Remove the context and every branch derived from it.
    Delete,
    /// Run the configured pruner over the stored entries.
    Prune,
}

impl SyncEventType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Prune => "prune",
        }
    }
}

impl fmt::Display for SyncEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to one shared context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSyncEvent {
    #[serde(rename = "type")]
    kind: SyncEventType,
    agent_id: AgentId,
    context_id: ContextId,
    #[serde(default)]
    nodes: Vec<ContextEntry>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<InstanceId>,
}

impl ContextSyncEvent {
    fn new(
        kind: SyncEventType,
        agent_id: AgentId,
        context_id: ContextId,
        nodes: Vec<ContextEntry>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            kind,
            agent_id,
            context_id,
            nodes,
            timestamp: clock.utc(),
            metadata: Map::new(),
            origin: None,
        }
    }

    /// Replaces the entries of `context_id` with `nodes`.
    #[must_use]
    pub fn update(
        agent_id: impl Into<AgentId>,
        context_id: impl Into<ContextId>,
        nodes: Vec<ContextEntry>,
        clock: &impl Clock,
    ) -> Self {
        Self::new(
            SyncEventType::Update,
            agent_id.into(),
            context_id.into(),
            nodes,
            clock,
        )
    }

    /// Deletes `context_id` and its branches.
    #[must_use]
    pub fn delete(
        agent_id: impl Into<AgentId>,
        context_id: impl Into<ContextId>,
        clock: &impl Clock,
    ) -> Self {
        Self::new(
            SyncEventType::Delete,
            agent_id.into(),
            context_id.into(),
            Vec::new(),
            clock,
        )
    }

    /// Prunes the stored entries of `context_id`.
    #[must_use]
    pub fn prune(
        agent_id: impl Into<AgentId>,
        context_id: impl Into<ContextId>,
        clock: &impl Clock,
    ) -> Self {
        Self::new(
            SyncEventType::Prune,
            agent_id.into(),
            context_id.into(),
            Vec::new(),
            clock,
        )
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the kind of change.
    #[must_use]
    pub const fn kind(&self) -> SyncEventType {
        self.kind
    }

    /// Returns the agent that made the change.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the changed context.
    #[must_use]
    pub const fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Returns the entries carried by the event.
    #[must_use]
    pub fn nodes(&self) -> &[ContextEntry] {
        &self.nodes
    }

    /// Returns when the change was made.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the free-form metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the context manager instance that published the event.
    #[must_use]
    pub const fn origin(&self) -> Option<InstanceId> {
        self.origin
    }

    pub(crate) const fn with_origin(mut self, origin: InstanceId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Turns a prune request into the update that publishes its result.
    pub(crate) fn into_pruned_update(self, nodes: Vec<ContextEntry>) -> Self {
        Self {
            kind: SyncEventType::Update,
            nodes,
            ..self
        }
    }
}
