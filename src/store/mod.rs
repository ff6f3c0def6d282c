//! Shared key-value and publish/subscribe store.
//!
//! The store is an external collaborator. This module holds its port
//! ([`ports::StoreConnection`]), the key layout every service writes
//! through ([`keys::KeySpace`]), and an in-memory adapter.

pub mod adapters;
pub mod keys;
pub(crate) mod listener;
pub mod ports;

#[cfg(test)]
mod tests;
