//! Error types for discovery domain parsing.

use thiserror::Error;

/// Error returned while parsing an agent status string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent status: {0}")]
pub struct ParseAgentStatusError(pub String);
