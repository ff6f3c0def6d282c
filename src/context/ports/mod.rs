//! Port contracts for context policies.

pub mod pruner;

#[cfg(test)]
pub use pruner::MockContextPruner;
pub use pruner::{ContextPruner, RetainAll};
