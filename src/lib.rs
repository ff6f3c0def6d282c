//! Backplane: discovery, messaging, and shared context for cooperating
//! agent processes.
//!
//! Agents attached to the same store find each other, exchange messages,
//! and share evolving context without knowing about each other's processes.
//! All state lives in a shared key-value and publish/subscribe store;
//! nothing is coordinated in-process across backplane instances.
//!
//! # Architecture
//!
//! Each service follows the hexagonal layout:
//!
//! - **Domain**: identifiers, records, and wire events with no store access
//! - **Ports**: traits at the seams (store connections, handlers, watchers,
//!   pruning policy)
//! - **Services**: logic that drives the ports
//!
//! # Modules
//!
//! - [`store`]: the store port, key layout, and an in-memory adapter
//! - [`discovery`]: agent registry with heartbeats and staleness eviction
//! - [`broker`]: envelope persistence and fan-out to local handlers
//! - [`context`]: shared context entries, sync events, and branches
//! - [`backplane`]: the facade tying the services together
//! - [`config`]: configuration and validation

pub(crate) mod background;
pub mod backplane;
pub mod broker;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod store;
pub(crate) mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use backplane::Backplane;
pub use config::BackplaneConfig;
pub use error::{BackplaneError, BackplaneResult, HandlerError, HandlerResult};
