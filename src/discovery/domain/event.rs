//! Events announced on the discovery channel.

use super::{AgentId, AgentInfo};
use serde::{Deserialize, Serialize};

/// Change to the set of registered agents.
///
/// Serialised as `{"type": "add" | "update", "agent": ...}` or
/// `{"type": "remove", "agentId": ..., "agent"?: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DiscoveryEvent {
    /// An agent registered, or re-registered.
    Add {
        /// The registered record.
        agent: AgentInfo,
    },
    /// An agent changed its status.
    Update {
        /// The record after the change.
        agent: AgentInfo,
    },
    /// An agent was unregistered or evicted.
    Remove {
        /// Identifier of the removed agent.
        agent_id: AgentId,
        /// The removed record, when it still existed at removal time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<AgentInfo>,
    },
}

impl DiscoveryEvent {
    /// Returns the identifier of the agent the event concerns.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::Add { agent } | Self::Update { agent } => agent.id(),
            Self::Remove { agent_id, .. } => agent_id,
        }
    }

    /// Returns the agent record carried by the event, if any.
    #[must_use]
    pub const fn agent(&self) -> Option<&AgentInfo> {
        match self {
            Self::Add { agent } | Self::Update { agent } => Some(agent),
            Self::Remove { agent, .. } => agent.as_ref(),
        }
    }

    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
        }
    }
}
