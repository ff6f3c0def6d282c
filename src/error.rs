//! Crate-level error types.

use thiserror::Error;

use crate::broker::services::BrokerError;
use crate::config::ConfigError;
use crate::context::services::ContextError;
use crate::discovery::services::DiscoveryError;
use crate::store::ports::StoreError;

/// Result type for backplane facade operations.
pub type BackplaneResult<T> = Result<T, BackplaneError>;

/// Errors surfaced by the [`Backplane`](crate::backplane::Backplane) facade.
#[derive(Debug, Clone, Error)]
pub enum BackplaneError {
    /// The operation needs a connected backplane.
    #[error("backplane is not connected")]
    NotConnected,

    /// The configuration was rejected before connecting.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store refused or failed a connection-level operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A discovery operation failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A broker operation failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A context operation failed.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl BackplaneError {
    /// Returns `true` when the error reports a missing agent or branch.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Discovery(DiscoveryError::AgentNotFound(_))
                | Self::Context(ContextError::BranchNotFound { .. })
        )
    }

    /// Returns `true` when the store could not be reached or rejected a
    /// command.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Discovery(DiscoveryError::Store(_))
                | Self::Broker(BrokerError::Store(_))
                | Self::Context(ContextError::Store(_))
        )
    }
}

/// Failure reported by an application callback during dispatch.
///
/// Handler failures are logged at the dispatch boundary and never reach the
/// publisher or other handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error with a human-readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type returned by message handlers and agent watchers.
pub type HandlerResult = Result<(), HandlerError>;
