//! Connection contract for the shared key-value and publish/subscribe store.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Network location of the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreEndpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl StoreEndpoint {
    /// Creates an endpoint from a host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for StoreEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens connections to the shared store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connection type produced by this connector.
    type Connection: StoreConnection;

    /// Opens a new command connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unreachable`] when the store cannot be reached.
    async fn connect(&self, endpoint: &StoreEndpoint) -> StoreResult<Self::Connection>;
}

/// A live handle on the shared store.
///
/// A connection that has entered subscriber mode through
/// [`StoreConnection::subscribe`] refuses every other command, so services
/// that listen on a channel must [`duplicate`](StoreConnection::duplicate)
/// the command connection first and close the duplicate when they stop.
#[async_trait]
pub trait StoreConnection: Send + Sync + Sized + 'static {
    /// Stream of payloads produced by [`StoreConnection::subscribe`].
    type Subscription: Subscription + 'static;

    /// Reads the value stored under `key`, if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the command cannot be executed.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key`, replacing any prior value, expiring after
    /// `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the command cannot be executed.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Deletes `key`, returning whether a live value was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the command cannot be executed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Lists live keys starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the command cannot be executed.
    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Publishes `payload` on `channel`, returning the number of subscribers
    /// that received it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the command cannot be executed.
    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize>;

    /// Subscribes to `channel`, switching this connection to subscriber mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the subscription cannot be established.
    async fn subscribe(&self, channel: &str) -> StoreResult<Self::Subscription>;

    /// Opens a new connection to the same store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the new connection cannot be opened.
    async fn duplicate(&self) -> StoreResult<Self>;

    /// Closes the connection. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend reports a failure while
    /// releasing the connection.
    async fn close(&self) -> StoreResult<()>;

    /// Returns `true` once [`StoreConnection::close`] has been called.
    fn is_closed(&self) -> bool;
}

/// Payload stream for one subscribed channel.
#[async_trait]
pub trait Subscription: Send {
    /// Returns the subscribed channel name.
    fn channel(&self) -> &str;

    /// Waits for the next payload.
    ///
    /// Returns `None` once the owning connection has been closed.
    async fn next_payload(&mut self) -> Option<String>;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The connection has been closed.
    #[error("store connection is closed")]
    Closed,

    /// The connection holds a live subscription and cannot issue commands.
    #[error("connection is in subscriber mode and cannot issue commands")]
    SubscriberMode,

    /// The store could not be reached.
    #[error("store at {endpoint} is unreachable")]
    Unreachable {
        /// Endpoint that refused the connection.
        endpoint: String,
    },

    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
