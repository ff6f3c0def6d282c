//! Agent discovery.
//!
//! Agents register a record describing their role and capabilities. Each
//! registered agent is kept alive by a heartbeat task; a sweep task evicts
//! agents whose heartbeat has gone stale. Every change is announced on the
//! discovery channel so watchers in other processes see it too.
//!
//! - Domain types in [`domain`]
//! - Watcher port in [`ports`]
//! - The [`services::DiscoveryService`] orchestrating registry and events

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
