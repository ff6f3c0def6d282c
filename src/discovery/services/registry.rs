//! Agent records in the shared store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::discovery::{DiscoveryError, DiscoveryResult};
use crate::config::{BackplaneConfig, DiscoveryTiming};
use crate::discovery::domain::{AgentId, AgentRecord, DiscoveryEvent};
use crate::store::keys::{KeySpace, Namespace};
use crate::store::ports::StoreConnection;

/// Store-facing half of the discovery service.
///
/// Heartbeat and sweep tasks hold an `Arc` of the registry and nothing else,
/// so they never keep the service itself alive.
///
/// Read-modify-write updates go through [`AgentRegistry::modify`], which
/// serialises them within this process. Writers in other processes are not
/// covered: the last save wins.
pub(crate) struct AgentRegistry<S, C> {
    connection: Arc<S>,
    updates: Mutex<()>,
    clock: Arc<C>,
    keys: KeySpace,
    channel: String,
    ttl: Duration,
    timing: DiscoveryTiming,
}

impl<S, C> AgentRegistry<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    pub(crate) fn new(connection: Arc<S>, config: &BackplaneConfig, clock: Arc<C>) -> Self {
        Self {
            connection,
            updates: Mutex::new(()),
            clock,
            keys: config.keys(),
            channel: config.discovery_channel(),
            ttl: config.retention.agents,
            timing: config.discovery,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    pub(crate) const fn timing(&self) -> DiscoveryTiming {
        self.timing
    }

    pub(crate) fn connection(&self) -> &S {
        &self.connection
    }

    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    fn key(&self, id: &AgentId) -> String {
        self.keys.key(Namespace::Agent, id.as_str())
    }

    pub(crate) async fn load(&self, id: &AgentId) -> DiscoveryResult<Option<AgentRecord>> {
        let Some(raw) = self.connection.get(&self.key(id)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(DiscoveryError::codec)?;
        Ok(Some(record))
    }

    pub(crate) async fn save(&self, record: &AgentRecord) -> DiscoveryResult<()> {
        let raw = serde_json::to_string(record).map_err(DiscoveryError::codec)?;
        self.connection
            .set(&self.key(record.agent.id()), &raw, self.ttl)
            .await?;
        Ok(())
    }

    pub(crate) async fn remove(&self, id: &AgentId) -> DiscoveryResult<bool> {
        Ok(self.connection.delete(&self.key(id)).await?)
    }

    pub(crate) async fn announce(&self, event: &DiscoveryEvent) -> DiscoveryResult<()> {
        let payload = serde_json::to_string(event).map_err(DiscoveryError::codec)?;
        let receivers = self.connection.publish(&self.channel, &payload).await?;
        debug!(
            agent_id = %event.agent_id(),
            kind = event.kind(),
            receivers,
            "announced discovery event"
        );
        Ok(())
    }

    /// Returns every decodable agent record.
    ///
    /// Records that expire between listing and reading are skipped, as are
    /// records that no longer decode.
    pub(crate) async fn scan(&self) -> DiscoveryResult<Vec<AgentRecord>> {
        let keys = self
            .connection
            .keys(&self.keys.scan(Namespace::Agent))
            .await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.connection.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<AgentRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(err) => warn!(%key, error = %err, "skipping undecodable agent record"),
            }
        }
        Ok(records)
    }

    /// Loads the record of `id`, applies `change`, and saves it.
    ///
    /// Local updates to the same registry wait for each other, so a
    /// heartbeat never writes back a record read before a status change.
    /// Returns `None` when the record does not exist; nothing is written.
    pub(crate) async fn modify<F>(
        &self,
        id: &AgentId,
        change: F,
    ) -> DiscoveryResult<Option<AgentRecord>>
    where
        F: FnOnce(&mut AgentRecord, DateTime<Utc>) + Send,
    {
        let _guard = self.updates.lock().await;
        let Some(mut record) = self.load(id).await? else {
            return Ok(None);
        };
        change(&mut record, self.now());
        self.save(&record).await?;
        Ok(Some(record))
    }

    /// Refreshes the heartbeat of `id`.
    ///
    /// Returns `false` when the record no longer exists, in which case
    /// nothing is written.
    pub(crate) async fn refresh(&self, id: &AgentId) -> DiscoveryResult<bool> {
        let refreshed = self.modify(id, |record, now| record.beat(now)).await?;
        Ok(refreshed.is_some())
    }

    /// Returns the records whose last heartbeat is older than the
    /// staleness bound.
    pub(crate) async fn stale(&self) -> DiscoveryResult<Vec<AgentRecord>> {
        let bound = TimeDelta::from_std(self.timing.staleness_bound).unwrap_or(TimeDelta::MAX);
        let now = self.now();
        let mut records = self.scan().await?;
        records.retain(|record| now.signed_duration_since(record.last_heartbeat) > bound);
        Ok(records)
    }
}
