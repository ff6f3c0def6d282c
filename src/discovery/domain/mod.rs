//! Domain model for agent discovery.

mod agent;
mod error;
mod event;
mod ids;
mod query;
mod status;

pub use agent::AgentInfo;
pub(crate) use agent::AgentRecord;
pub use error::ParseAgentStatusError;
pub use event::DiscoveryEvent;
pub use ids::AgentId;
pub use query::AgentQuery;
pub use status::AgentStatus;
