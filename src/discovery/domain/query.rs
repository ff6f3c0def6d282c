//! Filters for agent lookups.

use super::{AgentInfo, AgentStatus};
use std::collections::BTreeSet;

/// Conjunction of optional filters over agent records.
///
/// An empty query matches every agent. Capabilities match as a superset:
/// an agent must advertise every requested capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentQuery {
    role: Option<String>,
    capabilities: BTreeSet<String>,
    status: Option<AgentStatus>,
}

impl AgentQuery {
    /// Creates a query that matches every agent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts matches to agents with exactly this role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Restricts matches to agents advertising all of `capabilities`.
    #[must_use]
    pub fn with_capabilities<I, T>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Restricts matches to agents with exactly this status.
    #[must_use]
    pub const fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Fills in `status` when the query does not constrain status yet.
    #[must_use]
    pub const fn with_default_status(mut self, status: AgentStatus) -> Self {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self
    }

    /// Returns the role filter.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the required capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Returns the status filter.
    #[must_use]
    pub const fn status(&self) -> Option<AgentStatus> {
        self.status
    }

    /// Returns `true` when `agent` satisfies every filter.
    #[must_use]
    pub fn matches(&self, agent: &AgentInfo) -> bool {
        self.role.as_deref().is_none_or(|role| agent.role() == role)
            && agent.has_capabilities(&self.capabilities)
            && self.status.is_none_or(|status| agent.status() == status)
    }
}
