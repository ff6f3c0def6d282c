//! Transport envelopes.

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{AgentMessage, Priority};
use crate::discovery::domain::AgentId;

/// Globally unique envelope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(Uuid);

impl EnvelopeId {
    /// Creates a new random envelope identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an envelope identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EnvelopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an envelope comes from and where it is going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    /// Sending agent.
    pub source: AgentId,
    /// Receiving agent.
    pub target: AgentId,
    /// Logical sub-channel chosen by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Priority copied from the message.
    #[serde(default)]
    pub priority: Priority,
}

/// Transport metadata attached by the sender.
///
/// `ttl` is advisory and is interpreted by the receiving agent, never by the
/// broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Shared context the message refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Identifier tying a reply to its request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Advisory lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Number of delivery attempts made by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl EnvelopeMetadata {
    /// Sets the context id.
    #[must_use]
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// One message addressed to one agent.
///
/// Broadcasts create one envelope per recipient. Envelopes are never
/// modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    id: EnvelopeId,
    timestamp: DateTime<Utc>,
    message: AgentMessage,
    routing: Routing,
    #[serde(default)]
    metadata: EnvelopeMetadata,
}

impl MessageEnvelope {
    /// Wraps `message` for delivery to `target`.
    ///
    /// The routing source and priority are taken from the message metadata.
    #[must_use]
    pub fn new(
        message: AgentMessage,
        target: AgentId,
        metadata: EnvelopeMetadata,
        clock: &impl Clock,
    ) -> Self {
        let routing = Routing {
            source: message.metadata.sender.clone(),
            target,
            channel: None,
            priority: message.metadata.priority,
        };
        Self {
            id: EnvelopeId::new(),
            timestamp: clock.utc(),
            message,
            routing,
            metadata,
        }
    }

    /// Sets the routing sub-channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.routing.channel = Some(channel.into());
        self
    }

    /// Returns the envelope identifier.
    #[must_use]
    pub const fn id(&self) -> EnvelopeId {
        self.id
    }

    /// Returns the creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the wrapped message.
    #[must_use]
    pub const fn message(&self) -> &AgentMessage {
        &self.message
    }

    /// Returns the routing information.
    #[must_use]
    pub const fn routing(&self) -> &Routing {
        &self.routing
    }

    /// Returns the transport metadata.
    #[must_use]
    pub const fn metadata(&self) -> &EnvelopeMetadata {
        &self.metadata
    }

    /// Returns `true` when `agent` is the routing target.
    #[must_use]
    pub fn is_addressed_to(&self, agent: &AgentId) -> bool {
        self.routing.target == *agent
    }
}
