//! Store adapter implementations.
//!
//! - [`memory`]: shared in-memory hub used by tests and single-process
//!   deployments

pub mod memory;

pub use memory::{InMemoryConnection, InMemoryStore, InMemorySubscription};
