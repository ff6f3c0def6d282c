//! Port contracts for discovery consumers.

pub mod watcher;

pub use watcher::{AgentWatcher, WatcherId, watcher_fn};
