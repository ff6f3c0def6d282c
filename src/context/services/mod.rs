//! Application services for shared context.

mod manager;
mod state;

pub use manager::{ContextError, ContextManager, ContextResult};
