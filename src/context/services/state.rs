//! Context records in the shared store.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{debug, warn};

use super::manager::{ContextError, ContextResult};
use crate::config::BackplaneConfig;
use crate::context::domain::{
    BranchId, ContextBranch, ContextEntry, ContextId, ContextSyncEvent, InstanceId, SyncEventType,
};
use crate::context::ports::ContextPruner;
use crate::store::keys::{KeySpace, Namespace};
use crate::store::ports::StoreConnection;

/// Store-facing half of the context manager, shared with its listener.
pub(crate) struct ContextState<S, C> {
    connection: Arc<S>,
    clock: Arc<C>,
    keys: KeySpace,
    channel: String,
    ttl: Duration,
    pruner: Arc<dyn ContextPruner>,
    instance: InstanceId,
}

impl<S, C> ContextState<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    pub(crate) fn new(
        connection: Arc<S>,
        config: &BackplaneConfig,
        clock: Arc<C>,
        pruner: Arc<dyn ContextPruner>,
    ) -> Self {
        Self {
            connection,
            clock,
            keys: config.keys(),
            channel: config.context_channel(),
            ttl: config.retention.contexts,
            pruner,
            instance: InstanceId::new(),
        }
    }

    pub(crate) fn connection(&self) -> &S {
        &self.connection
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) const fn instance(&self) -> InstanceId {
        self.instance
    }

    fn context_key(&self, id: &ContextId) -> String {
        self.keys.key(Namespace::Context, id.as_str())
    }

    fn branch_key(&self, id: &BranchId) -> String {
        self.keys.key(Namespace::Branch, id.as_str())
    }

    pub(crate) async fn read_nodes(&self, id: &ContextId) -> ContextResult<Vec<ContextEntry>> {
        let Some(raw) = self.connection.get(&self.context_key(id)).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(ContextError::codec)
    }

    pub(crate) async fn write_nodes(
        &self,
        id: &ContextId,
        nodes: &[ContextEntry],
    ) -> ContextResult<()> {
        let raw = serde_json::to_string(nodes).map_err(ContextError::codec)?;
        self.connection
            .set(&self.context_key(id), &raw, self.ttl)
            .await?;
        Ok(())
    }

    pub(crate) async fn load_branch(&self, id: &BranchId) -> ContextResult<Option<ContextBranch>> {
        let Some(raw) = self.connection.get(&self.branch_key(id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw).map_err(ContextError::codec)?))
    }

    pub(crate) async fn save_branch(&self, branch: &ContextBranch) -> ContextResult<()> {
        let raw = serde_json::to_string(branch).map_err(ContextError::codec)?;
        self.connection
            .set(&self.branch_key(branch.id()), &raw, self.ttl)
            .await?;
        Ok(())
    }

    /// Deletes a branch record together with the context holding its
    /// entries.
    pub(crate) async fn drop_branch(&self, id: &BranchId) -> ContextResult<()> {
        self.connection.delete(&self.branch_key(id)).await?;
        self.connection
            .delete(&self.context_key(&id.as_context_id()))
            .await?;
        Ok(())
    }

    /// Returns the ids of every stored branch.
    pub(crate) async fn branch_ids(&self) -> ContextResult<Vec<BranchId>> {
        let keys = self
            .connection
            .keys(&self.keys.scan(Namespace::Branch))
            .await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.keys.id_from_key(Namespace::Branch, key))
            .map(BranchId::new)
            .collect())
    }

    /// Returns every decodable branch record.
    pub(crate) async fn branches(&self) -> ContextResult<Vec<ContextBranch>> {
        let mut branches = Vec::new();
        for id in self.branch_ids().await? {
            match self.load_branch(&id).await {
                Ok(Some(branch)) => branches.push(branch),
                Ok(None) => {}
                Err(ContextError::Codec(err)) => {
                    warn!(branch_id = %id, error = %err, "skipping undecodable branch");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(branches)
    }

    /// Applies `event` to the store and returns the event that describes
    /// the resulting change.
    ///
    /// A prune is resolved into the update carrying the pruned entries.
    pub(crate) async fn apply(&self, event: ContextSyncEvent) -> ContextResult<ContextSyncEvent> {
        match event.kind() {
            SyncEventType::Update => {
                self.apply_update(&event).await?;
                Ok(event)
            }
            SyncEventType::Delete => {
                self.apply_delete(event.context_id()).await?;
                Ok(event)
            }
            SyncEventType::Prune => {
                let current = self.read_nodes(event.context_id()).await?;
                let kept = self.pruner.prune(event.context_id(), current).await;
                let update = event.into_pruned_update(kept);
                self.apply_update(&update).await?;
                Ok(update)
            }
        }
    }

    async fn apply_update(&self, event: &ContextSyncEvent) -> ContextResult<()> {
        let context_id = event.context_id();
        self.write_nodes(context_id, event.nodes()).await?;
        let branch_id = BranchId::new(context_id.as_str());
        if let Some(mut branch) = self.load_branch(&branch_id).await? {
            branch.replace_nodes(event.nodes().to_vec(), self.clock.utc());
            self.save_branch(&branch).await?;
            debug!(branch_id = %branch_id, "branch entries replaced");
        }
        Ok(())
    }

    async fn apply_delete(&self, context_id: &ContextId) -> ContextResult<()> {
        self.connection.delete(&self.context_key(context_id)).await?;
        for branch_id in self.branch_ids().await? {
            if branch_id.as_str().contains(context_id.as_str()) {
                self.drop_branch(&branch_id).await?;
                debug!(%branch_id, %context_id, "branch removed with its context");
            }
        }
        Ok(())
    }

    pub(crate) async fn publish(&self, event: &ContextSyncEvent) -> ContextResult<()> {
        let payload = serde_json::to_string(event).map_err(ContextError::codec)?;
        let receivers = self.connection.publish(&self.channel, &payload).await?;
        debug!(
            context_id = %event.context_id(),
            kind = %event.kind(),
            receivers,
            "published context sync"
        );
        Ok(())
    }

    /// Applies an event received from the channel without republishing it.
    ///
    /// Events this instance published itself are skipped, as are payloads
    /// that do not decode.
    pub(crate) async fn apply_inbound(&self, payload: &str) {
        let event: ContextSyncEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "dropping malformed context sync event");
                return;
            }
        };
        if event.origin() == Some(self.instance) {
            return;
        }
        let context_id = event.context_id().clone();
        let kind = event.kind();
        match self.apply(event).await {
            Ok(_) => debug!(%context_id, %kind, "applied remote context sync"),
            Err(err) => {
                warn!(%context_id, %kind, error = %err, "failed to apply remote context sync");
            }
        }
    }
}
