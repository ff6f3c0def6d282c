//! Application messages exchanged between agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::MessageContent;
use crate::discovery::domain::AgentId;

/// Delivery urgency of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background traffic.
    Low,
    /// Normal traffic.
    #[default]
    Medium,
    /// Traffic that should be handled ahead of normal work.
    High,
    /// Traffic that should interrupt current work.
    Critical,
}

impl Priority {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender-side metadata of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Agent that sent the message.
    pub sender: AgentId,
    /// Delivery urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Whether the sender expects a reply.
    #[serde(default)]
    pub requires_response: bool,
    /// Time after which a reply is no longer useful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Message as written by the sending agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Application-defined message type, e.g. `task_request`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload.
    pub content: MessageContent,
    /// Sender-side metadata.
    pub metadata: MessageMetadata,
}

impl AgentMessage {
    /// Creates a medium-priority message that expects no reply.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        content: MessageContent,
        sender: impl Into<AgentId>,
    ) -> Self {
        Self {
            kind: kind.into(),
            content,
            metadata: MessageMetadata {
                sender: sender.into(),
                priority: Priority::default(),
                requires_response: false,
                deadline: None,
            },
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.metadata.priority = priority;
        self
    }

    /// Marks the message as expecting a reply, optionally by `deadline`.
    #[must_use]
    pub const fn expecting_response(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.metadata.requires_response = true;
        self.metadata.deadline = deadline;
        self
    }

    /// Returns the sender.
    #[must_use]
    pub const fn sender(&self) -> &AgentId {
        &self.metadata.sender
    }
}
