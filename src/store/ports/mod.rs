//! Port contracts for the shared store.
//!
//! The backplane never talks to a concrete store directly. Every service
//! receives a connection implementing [`StoreConnection`], which keeps the
//! discovery, broker, and context services independent of the substrate.

pub mod connection;

pub use connection::{
    StoreConnection, StoreConnector, StoreEndpoint, StoreError, StoreResult, Subscription,
};
