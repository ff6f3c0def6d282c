//! Service layer for message transport.
//!
//! Provides [`MessageBroker`], which persists and publishes envelopes and
//! fans received envelopes out to local handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::background::CallbackQueue;
use crate::broker::domain::{EnvelopeId, MessageEnvelope};
use crate::broker::ports::MessageHandler;
use crate::config::BackplaneConfig;
use crate::discovery::domain::AgentId;
use crate::store::keys::{KeySpace, Namespace};
use crate::store::listener::ChannelListener;
use crate::store::ports::{StoreConnection, StoreError};
use crate::sync::{lock, read, write};

/// Service-level errors for broker operations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The store rejected or failed a command.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An envelope could not be encoded or decoded.
    #[error("envelope codec error: {0}")]
    Codec(Arc<serde_json::Error>),
}

impl BrokerError {
    fn codec(err: serde_json::Error) -> Self {
        Self::Codec(Arc::new(err))
    }
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

type HandlerMap = RwLock<HashMap<AgentId, CallbackQueue<MessageEnvelope>>>;

/// Envelope persistence, publication, and local dispatch.
pub struct MessageBroker<S: StoreConnection> {
    connection: Arc<S>,
    keys: KeySpace,
    channel: String,
    retention: Duration,
    handlers: Arc<HandlerMap>,
    listener: Mutex<Option<ChannelListener<S>>>,
}

impl<S: StoreConnection> MessageBroker<S> {
    /// Creates a stopped broker over `connection`.
    #[must_use]
    pub fn new(connection: Arc<S>, config: &BackplaneConfig) -> Self {
        Self {
            connection,
            keys: config.keys(),
            channel: config.message_channel(),
            retention: config.retention.messages,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            listener: Mutex::new(None),
        }
    }

    /// Subscribes to the message channel. Starting twice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the subscription cannot be
    /// established.
    pub async fn start(&self) -> BrokerResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let handlers = Arc::clone(&self.handlers);
        let listener =
            ChannelListener::spawn(&*self.connection, self.channel.clone(), move |payload| {
                dispatch(&handlers, &payload);
                async {}
            })
            .await?;
        *lock(&self.listener) = Some(listener);
        info!(channel = %self.channel, "broker started");
        Ok(())
    }

    /// Returns `true` while the channel listener is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Persists `envelope` under its id and publishes it.
    ///
    /// Nothing waits for a consumer. Delivery to zero subscribers is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the envelope cannot be encoded, stored,
    /// or published. No retry is attempted.
    pub async fn publish(&self, envelope: &MessageEnvelope) -> BrokerResult<()> {
        let payload = serde_json::to_string(envelope).map_err(BrokerError::codec)?;
        let key = self.keys.key(Namespace::Message, &envelope.id().to_string());
        self.connection.set(&key, &payload, self.retention).await?;
        let receivers = self.connection.publish(&self.channel, &payload).await?;
        debug!(
            envelope_id = %envelope.id(),
            source = %envelope.routing().source,
            target = %envelope.routing().target,
            receivers,
            "published envelope"
        );
        Ok(())
    }

    /// Registers the handler for `agent_id`, replacing any previous one.
    ///
    /// The handler receives envelopes one at a time, in the order the
    /// channel delivered them. A replaced handler gets nothing further.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<H>(&self, agent_id: AgentId, handler: H)
    where
        H: MessageHandler + 'static,
    {
        let handler: Arc<dyn MessageHandler> = Arc::new(handler);
        let owner = agent_id.to_string();
        let queue = CallbackQueue::spawn("handler", owner, move |envelope: MessageEnvelope| {
            let current = Arc::clone(&handler);
            async move { current.handle(envelope).await }
        });
        let replaced = write(&self.handlers).insert(agent_id.clone(), queue);
        debug!(agent_id = %agent_id, replaced = replaced.is_some(), "handler subscribed");
    }

    /// Removes the handler for `agent_id` and stops its delivery queue.
    /// Returns `false` when none was registered.
    pub fn unsubscribe(&self, agent_id: &AgentId) -> bool {
        write(&self.handlers).remove(agent_id).is_some()
    }

    /// Returns how many handlers are registered.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        read(&self.handlers).len()
    }

    /// Looks up a persisted envelope.
    ///
    /// Returns `Ok(None)` once the envelope has expired.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the store fails or the stored envelope
    /// does not decode.
    pub async fn get_message(&self, id: EnvelopeId) -> BrokerResult<Option<MessageEnvelope>> {
        let key = self.keys.key(Namespace::Message, &id.to_string());
        let Some(raw) = self.connection.get(&key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw).map_err(BrokerError::codec)?))
    }

    /// Returns up to `limit` persisted envelopes in key enumeration order.
    ///
    /// Envelopes that expire mid-scan or no longer decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the store fails.
    pub async fn get_recent_messages(&self, limit: usize) -> BrokerResult<Vec<MessageEnvelope>> {
        let keys = self
            .connection
            .keys(&self.keys.scan(Namespace::Message))
            .await?;
        let mut envelopes = Vec::with_capacity(limit.min(keys.len()));
        for key in keys {
            if envelopes.len() == limit {
                break;
            }
            let Some(raw) = self.connection.get(&key).await? else {
                continue;
            };
            match serde_json::from_str(&raw) {
                Ok(envelope) => envelopes.push(envelope),
                Err(err) => warn!(%key, error = %err, "skipping undecodable envelope"),
            }
        }
        Ok(envelopes)
    }

    /// Stops the listener and drops every handler.
    ///
    /// Safe to call when never started, and more than once.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] when the listener connection fails to
    /// close.
    pub async fn cleanup(&self) -> BrokerResult<()> {
        let queues = std::mem::take(&mut *write(&self.handlers));
        for queue in queues.into_values() {
            queue.stop().await;
        }
        let listener = lock(&self.listener).take();
        if let Some(listener) = listener {
            debug!(channel = listener.channel(), "closing broker listener");
            listener.stop().await?;
            info!("broker stopped");
        }
        Ok(())
    }
}

/// Queues a received envelope for every registered handler without waiting
/// on any of them. Undecodable payloads are dropped.
fn dispatch(handlers: &HandlerMap, payload: &str) {
    let envelope: MessageEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "dropping malformed envelope");
            return;
        }
    };
    let queues = read(handlers);
    debug!(envelope_id = %envelope.id(), handlers = queues.len(), "dispatching envelope");
    for (agent_id, queue) in &*queues {
        if !queue.push(envelope.clone()) {
            debug!(agent_id = %agent_id, "handler queue already stopped");
        }
    }
}
