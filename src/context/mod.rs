//! Shared context.
//!
//! A context is a named list of opaque entries that one agent publishes for
//! others to read. Every change is broadcast as a sync event on the context
//! channel and applied by every other context manager listening there.
//! Branches give one target an isolated snapshot of a context that can later
//! be merged back.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
