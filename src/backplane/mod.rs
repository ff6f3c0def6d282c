//! Backplane facade.
//!
//! [`Backplane`] owns one store connection and the discovery, broker, and
//! context services running over it. It exposes the services directly
//! through [`Backplane::discovery`], [`Backplane::broker`], and
//! [`Backplane::context`], and adds the cross-service operations agents use
//! most: direct and broadcast messaging, context sharing, and collaborator
//! lookup.
//!
//! # Lifecycle
//!
//! A backplane starts disconnected. [`Backplane::connect`] opens the store
//! connection and starts every service; if any step fails, everything that
//! was started is stopped again and the backplane stays disconnected.
//! [`Backplane::disconnect`] tears the services down and may be called any
//! number of times.

mod services;

use std::sync::{Arc, RwLock};

use mockable::Clock;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use self::services::Services;
use crate::broker::domain::{
    AgentMessage, EnvelopeId, EnvelopeMetadata, MessageContent, MessageEnvelope,
};
use crate::broker::services::MessageBroker;
use crate::config::BackplaneConfig;
use crate::context::domain::{BranchId, ContextId};
use crate::context::ports::{ContextPruner, RetainAll};
use crate::context::services::ContextManager;
use crate::discovery::domain::{AgentId, AgentInfo, AgentQuery, AgentStatus};
use crate::discovery::services::DiscoveryService;
use crate::error::{BackplaneError, BackplaneResult};
use crate::store::ports::StoreConnector;
use crate::sync::{read, write};

/// Message type sent by [`Backplane::share_context`].
pub const CONTEXT_SHARE_MESSAGE: &str = "context_share";

type Connection<K> = <K as StoreConnector>::Connection;

/// Entry point tying discovery, messaging, and shared context together.
pub struct Backplane<K, C>
where
    K: StoreConnector,
    C: Clock + Send + Sync + 'static,
{
    connector: K,
    config: BackplaneConfig,
    clock: Arc<C>,
    pruner: Arc<dyn ContextPruner>,
    lifecycle: Mutex<()>,
    services: RwLock<Option<Arc<Services<Connection<K>, C>>>>,
}

impl<K, C> Backplane<K, C>
where
    K: StoreConnector,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a disconnected backplane whose context manager keeps every
    /// entry on `prune`.
    #[must_use]
    pub fn new(connector: K, config: BackplaneConfig, clock: Arc<C>) -> Self {
        Self::with_pruner(connector, config, clock, Arc::new(RetainAll))
    }

    /// Creates a disconnected backplane using `pruner` for `prune` events.
    #[must_use]
    pub fn with_pruner(
        connector: K,
        config: BackplaneConfig,
        clock: Arc<C>,
        pruner: Arc<dyn ContextPruner>,
    ) -> Self {
        Self {
            connector,
            config,
            clock,
            pruner,
            lifecycle: Mutex::new(()),
            services: RwLock::new(None),
        }
    }

    /// Returns the configuration the backplane was built with.
    #[must_use]
    pub const fn config(&self) -> &BackplaneConfig {
        &self.config
    }

    /// Returns `true` between a successful [`Backplane::connect`] and the
    /// next [`Backplane::disconnect`].
    #[must_use]
    pub fn is_connected(&self) -> bool {
        read(&self.services).is_some()
    }

    /// Validates the configuration, connects to the store, and starts every
    /// service.
    ///
    /// Connecting a connected backplane does nothing. A failed attempt
    /// leaves no service running and no connection open, so it may be
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::Config`] for an invalid configuration,
    /// [`BackplaneError::Store`] when the store cannot be reached, or the
    /// error of the first service that failed to start.
    pub async fn connect(&self) -> BackplaneResult<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        self.config.validate()?;
        let endpoint = self.config.endpoint();
        let connection = self.connector.connect(&endpoint).await?;
        let started = Services::new(
            connection,
            &self.config,
            &self.clock,
            Arc::clone(&self.pruner),
        );
        if let Err(err) = started.start().await {
            warn!(%endpoint, error = %err, "backplane failed to start, rolling back");
            if let Err(rollback) = started.shutdown().await {
                warn!(%endpoint, error = %rollback, "rollback did not complete cleanly");
            }
            return Err(err);
        }
        *write(&self.services) = Some(Arc::new(started));
        info!(%endpoint, prefix = %self.config.prefix, "backplane connected");
        Ok(())
    }

    /// Stops every service and closes the store connection.
    ///
    /// Safe to call when disconnected, and more than once. Agent records,
    /// messages, and contexts stay in the store until their TTL expires.
    ///
    /// # Errors
    ///
    /// Every teardown step is attempted; the first failure is returned. The
    /// backplane is disconnected either way.
    pub async fn disconnect(&self) -> BackplaneResult<()> {
        let _guard = self.lifecycle.lock().await;
        let running = write(&self.services).take();
        let Some(running) = running else {
            return Ok(());
        };
        running.shutdown().await?;
        info!(prefix = %self.config.prefix, "backplane disconnected");
        Ok(())
    }

    /// Alias of [`Backplane::disconnect`].
    ///
    /// # Errors
    ///
    /// See [`Backplane::disconnect`].
    pub async fn cleanup(&self) -> BackplaneResult<()> {
        self.disconnect().await
    }

    fn services(&self) -> BackplaneResult<Arc<Services<Connection<K>, C>>> {
        read(&self.services)
            .clone()
            .ok_or(BackplaneError::NotConnected)
    }

    /// Returns the discovery service.
    ///
    /// The returned handle outlives [`Backplane::disconnect`]. Its
    /// connection is closed by then, so calls made through it afterwards
    /// fail with [`StoreError::Closed`](crate::store::ports::StoreError::Closed).
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected.
    pub fn discovery(&self) -> BackplaneResult<Arc<DiscoveryService<Connection<K>, C>>> {
        Ok(Arc::clone(&self.services()?.discovery))
    }

    /// Returns the message broker.
    ///
    /// The returned handle outlives [`Backplane::disconnect`]. Its
    /// connection is closed by then, so calls made through it afterwards
    /// fail with [`StoreError::Closed`](crate::store::ports::StoreError::Closed).
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected.
    pub fn broker(&self) -> BackplaneResult<Arc<MessageBroker<Connection<K>>>> {
        Ok(Arc::clone(&self.services()?.broker))
    }

    /// Returns the context manager.
    ///
    /// The returned handle outlives [`Backplane::disconnect`]. Its
    /// connection is closed by then, so calls made through it afterwards
    /// fail with [`StoreError::Closed`](crate::store::ports::StoreError::Closed).
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected.
    pub fn context(&self) -> BackplaneResult<Arc<ContextManager<Connection<K>, C>>> {
        Ok(Arc::clone(&self.services()?.context))
    }

    /// Sends `message` from its sender to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected, or
    /// [`BackplaneError::Broker`] when the envelope cannot be published.
    pub async fn send_message(
        &self,
        message: AgentMessage,
        target: AgentId,
    ) -> BackplaneResult<EnvelopeId> {
        self.send_message_with(message, target, EnvelopeMetadata::default())
            .await
    }

    /// Sends `message` to `target` with explicit envelope metadata.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected, or
    /// [`BackplaneError::Broker`] when the envelope cannot be published.
    pub async fn send_message_with(
        &self,
        message: AgentMessage,
        target: AgentId,
        metadata: EnvelopeMetadata,
    ) -> BackplaneResult<EnvelopeId> {
        let broker = self.broker()?;
        let envelope = MessageEnvelope::new(message, target, metadata, &*self.clock);
        broker.publish(&envelope).await?;
        debug!(
            envelope_id = %envelope.id(),
            source = %envelope.routing().source,
            target = %envelope.routing().target,
            "message sent"
        );
        Ok(envelope.id())
    }

    /// Sends `message` to every active agent matching `filter`.
    ///
    /// Any status in `filter` is replaced with `active`. The sender receives
    /// a copy when it matches. Returns one envelope id per recipient.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected, or the
    /// discovery or broker error that stopped the broadcast. Envelopes sent
    /// before the failure are not recalled.
    pub async fn broadcast_message(
        &self,
        message: AgentMessage,
        filter: AgentQuery,
    ) -> BackplaneResult<Vec<EnvelopeId>> {
        let query = filter.with_status(AgentStatus::Active);
        let recipients = self.discovery()?.find_agents(&query).await?;
        let mut sent = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let id = self
                .send_message(message.clone(), recipient.id().clone())
                .await?;
            sent.push(id);
        }
        info!(
            sender = %message.sender(),
            recipients = sent.len(),
            "message broadcast"
        );
        Ok(sent)
    }

    /// Branches `context_id` for `target_agent` and tells the target about
    /// it with a [`CONTEXT_SHARE_MESSAGE`] from `source_agent`.
    ///
    /// The message carries `{"contextId", "branchId"}` as JSON content and
    /// the context id in its envelope metadata.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected, or the
    /// context or broker error that stopped the share. A branch created
    /// before a failed send is left in place.
    pub async fn share_context(
        &self,
        source_agent: &AgentId,
        target_agent: &AgentId,
        context_id: &ContextId,
    ) -> BackplaneResult<BranchId> {
        let branch_id = self
            .context()?
            .create_context_branch(context_id, &ContextId::new(target_agent.as_str()))
            .await?;
        let notice = AgentMessage::new(
            CONTEXT_SHARE_MESSAGE,
            MessageContent::json(json!({
                "contextId": context_id.as_str(),
                "branchId": branch_id.as_str(),
            })),
            source_agent.clone(),
        );
        let metadata = EnvelopeMetadata::default().with_context_id(context_id.as_str());
        self.send_message_with(notice, target_agent.clone(), metadata)
            .await?;
        info!(
            %context_id,
            %branch_id,
            source = %source_agent,
            target = %target_agent,
            "context shared"
        );
        Ok(branch_id)
    }

    /// Finds agents matching `query`, defaulting to active agents when the
    /// query names no status.
    ///
    /// # Errors
    ///
    /// Returns [`BackplaneError::NotConnected`] when disconnected, or
    /// [`BackplaneError::Discovery`] when the lookup fails.
    pub async fn find_collaborators(&self, query: AgentQuery) -> BackplaneResult<Vec<AgentInfo>> {
        let effective = query.with_default_status(AgentStatus::Active);
        Ok(self.discovery()?.find_agents(&effective).await?)
    }
}

#[cfg(test)]
mod tests;
