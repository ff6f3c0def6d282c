//! Application services for agent discovery.

mod discovery;
mod registry;
mod watchers;

pub use discovery::{DiscoveryError, DiscoveryResult, DiscoveryService};
