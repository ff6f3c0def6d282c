//! Agent records as advertised to peers.

use super::{AgentId, AgentStatus};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Description of a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    id: AgentId,
    role: String,
    #[serde(default)]
    capabilities: BTreeSet<String>,
    status: AgentStatus,
    last_seen: DateTime<Utc>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl AgentInfo {
    /// Creates an `Active` agent with no capabilities or metadata.
    #[must_use]
    pub fn new(id: impl Into<AgentId>, role: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            capabilities: BTreeSet::new(),
            status: AgentStatus::Active,
            last_seen: clock.utc(),
            metadata: Map::new(),
        }
    }

    /// Sets the advertised capabilities.
    #[must_use]
    pub fn with_capabilities<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the advertised status.
    #[must_use]
    pub const fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns the role label.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Returns the advertised status.
    #[must_use]
    pub const fn status(&self) -> AgentStatus {
        self.status
    }

    /// Returns when the agent last wrote its record.
    #[must_use]
    pub const fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Returns the free-form metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns `true` when every capability in `required` is advertised.
    #[must_use]
    pub fn has_capabilities(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    pub(crate) fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
    }

    pub(crate) fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
    }
}

/// Stored form of an agent: the public record plus liveness bookkeeping
/// that never leaves the discovery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AgentRecord {
    #[serde(flatten)]
    pub(crate) agent: AgentInfo,
    pub(crate) last_heartbeat: DateTime<Utc>,
}

impl AgentRecord {
    /// Wraps `agent`, stamping both liveness fields with `now`.
    pub(crate) fn fresh(mut agent: AgentInfo, now: DateTime<Utc>) -> Self {
        agent.mark_seen(now);
        Self {
            agent,
            last_heartbeat: now,
        }
    }

    pub(crate) fn beat(&mut self, now: DateTime<Utc>) {
        self.agent.mark_seen(now);
        self.last_heartbeat = now;
    }
}
