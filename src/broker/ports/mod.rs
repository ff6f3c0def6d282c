//! Port contracts for message consumers.

pub mod handler;

pub use handler::{MessageHandler, handler_fn};
