//! Service layer for agent discovery.
//!
//! Provides [`DiscoveryService`], which registers agents, keeps their
//! records alive with per-agent heartbeat tasks, evicts agents whose
//! heartbeat has gone stale, and relays discovery events to local watchers.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use mockable::Clock;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::registry::AgentRegistry;
use super::watchers::WatcherSet;
use crate::background::BackgroundTask;
use crate::config::BackplaneConfig;
use crate::discovery::domain::{
    AgentId, AgentInfo, AgentQuery, AgentRecord, AgentStatus, DiscoveryEvent,
};
use crate::discovery::ports::{AgentWatcher, WatcherId};
use crate::store::listener::ChannelListener;
use crate::store::ports::{StoreConnection, StoreError};
use crate::sync::lock;

/// Service-level errors for discovery operations.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// No record exists for the agent.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The store rejected or failed a command.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record or event could not be encoded or decoded.
    #[error("discovery codec error: {0}")]
    Codec(Arc<serde_json::Error>),
}

impl DiscoveryError {
    pub(crate) fn codec(err: serde_json::Error) -> Self {
        Self::Codec(Arc::new(err))
    }
}

/// Result type for discovery service operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

type HeartbeatMap = Arc<Mutex<HashMap<AgentId, BackgroundTask>>>;

/// Agent registration, liveness tracking, and lookup.
pub struct DiscoveryService<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    registry: Arc<AgentRegistry<S, C>>,
    watchers: Arc<WatcherSet>,
    heartbeats: HeartbeatMap,
    sweeper: Mutex<Option<BackgroundTask>>,
    listener: Mutex<Option<ChannelListener<S>>>,
}

impl<S, C> DiscoveryService<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a stopped discovery service over `connection`.
    ///
    /// Registration and lookups work immediately. Watchers and the
    /// staleness sweep only run after [`DiscoveryService::start`].
    #[must_use]
    pub fn new(connection: Arc<S>, config: &BackplaneConfig, clock: Arc<C>) -> Self {
        Self {
            registry: Arc::new(AgentRegistry::new(connection, config, clock)),
            watchers: Arc::new(WatcherSet::default()),
            heartbeats: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Subscribes to the discovery channel and starts the staleness sweep.
    ///
    /// Starting a running service does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Store`] when the subscription cannot be
    /// established. Nothing is left running in that case.
    pub async fn start(&self) -> DiscoveryResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let watchers = Arc::clone(&self.watchers);
        let listener = ChannelListener::spawn(
            self.registry.connection(),
            self.registry.channel().to_owned(),
            move |payload| {
                watchers.dispatch_payload(&payload);
                async {}
            },
        )
        .await?;
        let sweeper = self.spawn_sweeper();
        *lock(&self.listener) = Some(listener);
        *lock(&self.sweeper) = Some(sweeper);
        info!(
            channel = self.registry.channel(),
            sweep_interval = ?self.registry.timing().sweep_interval,
            "discovery started"
        );
        Ok(())
    }

    /// Returns `true` while the channel listener is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Registers `agent`, replacing any existing record with the same id.
    ///
    /// Publishes an `add` event and (re)starts the agent's heartbeat. A
    /// heartbeat already running for the id is stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the record cannot be written or the
    /// event cannot be published.
    pub async fn register_agent(&self, agent: AgentInfo) -> DiscoveryResult<AgentInfo> {
        let id = agent.id().clone();
        self.stop_heartbeat(&id).await;
        let record = AgentRecord::fresh(agent, self.registry.now());
        self.registry.save(&record).await?;
        self.registry
            .announce(&DiscoveryEvent::Add {
                agent: record.agent.clone(),
            })
            .await?;
        let heartbeat = self.spawn_heartbeat(id.clone());
        let replaced = lock(&self.heartbeats).insert(id.clone(), heartbeat);
        if let Some(previous) = replaced {
            previous.stop().await;
        }
        info!(agent_id = %id, role = record.agent.role(), "agent registered");
        Ok(record.agent)
    }

    /// Removes the agent's record and stops its heartbeat.
    ///
    /// A `remove` event is published on every call, even when no record
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the store fails.
    pub async fn unregister_agent(&self, id: &AgentId) -> DiscoveryResult<()> {
        self.stop_heartbeat(id).await;
        let previous = self.registry.load(id).await.unwrap_or_else(|err| {
            warn!(agent_id = %id, error = %err, "could not read record before removal");
            None
        });
        let removed = self.registry.remove(id).await?;
        self.registry
            .announce(&DiscoveryEvent::Remove {
                agent_id: id.clone(),
                agent: previous.map(|record| record.agent),
            })
            .await?;
        info!(agent_id = %id, removed, "agent unregistered");
        Ok(())
    }

    /// Sets the status of a registered agent and refreshes its liveness.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::AgentNotFound`] when no record exists, or
    /// [`DiscoveryError::Store`] when the store fails.
    pub async fn update_agent_status(
        &self,
        id: &AgentId,
        status: AgentStatus,
    ) -> DiscoveryResult<AgentInfo> {
        let record = self
            .registry
            .modify(id, |record, now| {
                record.agent.set_status(status);
                record.beat(now);
            })
            .await?
            .ok_or_else(|| DiscoveryError::AgentNotFound(id.clone()))?;
        self.registry
            .announce(&DiscoveryEvent::Update {
                agent: record.agent.clone(),
            })
            .await?;
        debug!(agent_id = %id, %status, "agent status updated");
        Ok(record.agent)
    }

    /// Returns every registered agent matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Store`] when the scan fails.
    pub async fn find_agents(&self, query: &AgentQuery) -> DiscoveryResult<Vec<AgentInfo>> {
        let records = self.registry.scan().await?;
        Ok(records
            .into_iter()
            .map(|record| record.agent)
            .filter(|agent| query.matches(agent))
            .collect())
    }

    /// Returns the record of one agent, if registered.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the store fails or the record does not
    /// decode.
    pub async fn get_agent(&self, id: &AgentId) -> DiscoveryResult<Option<AgentInfo>> {
        Ok(self.registry.load(id).await?.map(|record| record.agent))
    }

    /// Registers a watcher for every event seen on the discovery channel.
    pub fn watch_agents<W>(&self, watcher: W) -> WatcherId
    where
        W: AgentWatcher + 'static,
    {
        self.watchers.add(Arc::new(watcher))
    }

    /// Removes a watcher. Returns `false` when it was not registered.
    pub fn unwatch(&self, id: WatcherId) -> bool {
        self.watchers.remove(id)
    }

    /// Returns how many watchers are registered.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Runs one staleness sweep and returns the agents it evicted.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the store fails mid-sweep.
    pub async fn sweep_stale(&self) -> DiscoveryResult<Vec<AgentId>> {
        sweep(&self.registry, &self.heartbeats).await
    }

    /// Stops heartbeats, the sweep, and the channel listener, and forgets
    /// every watcher.
    ///
    /// Safe to call on a service that never started, and more than once.
    /// Agent records are left in the store.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Store`] when the listener connection fails
    /// to close. Every other step still runs.
    pub async fn cleanup(&self) -> DiscoveryResult<()> {
        let sweeper = lock(&self.sweeper).take();
        if let Some(task) = sweeper {
            task.stop().await;
        }
        let heartbeats: Vec<_> = lock(&self.heartbeats).drain().collect();
        for (_, task) in heartbeats {
            task.stop().await;
        }
        self.watchers.shutdown().await;
        let listener = lock(&self.listener).take();
        if let Some(listener) = listener {
            debug!(channel = listener.channel(), "closing discovery listener");
            listener.stop().await?;
            info!("discovery stopped");
        }
        Ok(())
    }

    async fn stop_heartbeat(&self, id: &AgentId) {
        let task = lock(&self.heartbeats).remove(id);
        if let Some(task) = task {
            task.stop().await;
        }
    }

    fn spawn_heartbeat(&self, id: AgentId) -> BackgroundTask {
        let registry = Arc::clone(&self.registry);
        let period = registry.timing().heartbeat_interval;
        BackgroundTask::periodic(period, move || {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            async move {
                match registry.refresh(&id).await {
                    Ok(true) => ControlFlow::Continue(()),
                    Ok(false) => {
                        info!(agent_id = %id, "agent record gone; heartbeat stopped");
                        ControlFlow::Break(())
                    }
                    Err(DiscoveryError::Store(StoreError::Closed)) => ControlFlow::Break(()),
                    Err(err) => {
                        warn!(agent_id = %id, error = %err, "heartbeat refresh failed");
                        ControlFlow::Continue(())
                    }
                }
            }
        })
    }

    fn spawn_sweeper(&self) -> BackgroundTask {
        let registry = Arc::clone(&self.registry);
        let heartbeats = Arc::clone(&self.heartbeats);
        let period = registry.timing().sweep_interval;
        BackgroundTask::periodic(period, move || {
            let registry = Arc::clone(&registry);
            let heartbeats = Arc::clone(&heartbeats);
            async move {
                match sweep(&registry, &heartbeats).await {
                    Ok(_) => ControlFlow::Continue(()),
                    Err(DiscoveryError::Store(StoreError::Closed)) => ControlFlow::Break(()),
                    Err(err) => {
                        warn!(error = %err, "staleness sweep failed");
                        ControlFlow::Continue(())
                    }
                }
            }
        })
    }
}

/// Evicts stale agents through the removal path.
///
/// A local heartbeat for the agent is stopped before the record is deleted
/// so it cannot write the record back. The `remove` event is published only
/// when this sweep performed the delete, so concurrent sweepers in other
/// processes announce each eviction once between them.
async fn sweep<S, C>(
    registry: &AgentRegistry<S, C>,
    heartbeats: &HeartbeatMap,
) -> DiscoveryResult<Vec<AgentId>>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    let mut evicted = Vec::new();
    for record in registry.stale().await? {
        let id = record.agent.id().clone();
        let heartbeat = lock(heartbeats).remove(&id);
        if let Some(task) = heartbeat {
            task.stop().await;
        }
        if !registry.remove(&id).await? {
            debug!(agent_id = %id, "stale agent already removed elsewhere");
            continue;
        }
        registry
            .announce(&DiscoveryEvent::Remove {
                agent_id: id.clone(),
                agent: Some(record.agent),
            })
            .await?;
        info!(agent_id = %id, last_heartbeat = %record.last_heartbeat, "evicted stale agent");
        evicted.push(id);
    }
    Ok(evicted)
}
