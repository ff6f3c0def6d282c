//! Service layer for shared context.
//!
//! Provides [`ContextManager`], which stores context entry lists, broadcasts
//! changes to peer managers, and creates and merges branches.

use std::sync::{Arc, Mutex};

use mockable::Clock;
use thiserror::Error;
use tracing::{debug, info};

use super::state::ContextState;
use crate::config::BackplaneConfig;
use crate::context::domain::{
    BranchId, ContextBranch, ContextEntry, ContextId, ContextSyncEvent, InstanceId,
};
use crate::context::ports::{ContextPruner, RetainAll};
use crate::discovery::domain::AgentId;
use crate::store::listener::ChannelListener;
use crate::store::ports::{StoreConnection, StoreError};
use crate::sync::lock;

/// Service-level errors for context operations.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// No branch exists for the source and target pair.
    #[error("no branch of {source_id} for {target_id}")]
    BranchNotFound {
        /// Context the branch would have been taken from.
        source_id: ContextId,
        /// Context the branch would merge into.
        target_id: ContextId,
    },

    /// The store rejected or failed a command.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entries, a branch, or an event could not be encoded or decoded.
    #[error("context codec error: {0}")]
    Codec(Arc<serde_json::Error>),
}

impl ContextError {
    pub(crate) fn codec(err: serde_json::Error) -> Self {
        Self::Codec(Arc::new(err))
    }
}

/// Result type for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Shared context storage, synchronisation, and branching.
pub struct ContextManager<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    state: Arc<ContextState<S, C>>,
    listener: Mutex<Option<ChannelListener<S>>>,
}

impl<S, C> ContextManager<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a stopped manager whose `prune` events keep every entry.
    #[must_use]
    pub fn new(connection: Arc<S>, config: &BackplaneConfig, clock: Arc<C>) -> Self {
        Self::with_pruner(connection, config, clock, Arc::new(RetainAll))
    }

    /// Creates a stopped manager applying `pruner` to `prune` events.
    #[must_use]
    pub fn with_pruner(
        connection: Arc<S>,
        config: &BackplaneConfig,
        clock: Arc<C>,
        pruner: Arc<dyn ContextPruner>,
    ) -> Self {
        Self {
            state: Arc::new(ContextState::new(connection, config, clock, pruner)),
            listener: Mutex::new(None),
        }
    }

    /// Returns the identity stamped on events this manager publishes.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.state.instance()
    }

    /// Subscribes to the context channel so peer changes are applied
    /// locally. Starting twice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] when the subscription cannot be
    /// established.
    pub async fn start(&self) -> ContextResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let state = Arc::clone(&self.state);
        let listener = ChannelListener::spawn(
            self.state.connection(),
            self.state.channel().to_owned(),
            move |payload| {
                let state = Arc::clone(&state);
                async move { state.apply_inbound(&payload).await }
            },
        )
        .await?;
        *lock(&self.listener) = Some(listener);
        info!(
            channel = self.state.channel(),
            instance = %self.state.instance(),
            "context manager started"
        );
        Ok(())
    }

    /// Returns `true` while the channel listener is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Applies `event` locally and broadcasts it to peer managers.
    ///
    /// - `update` replaces the context entries and, when the context is a
    ///   branch, the branch entries too.
    /// - `delete` removes the context and every branch whose id contains the
    ///   context id.
    /// - `prune` runs the configured pruner over the stored entries; the
    ///   result is stored and broadcast as an `update`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the store fails or the event cannot be
    /// encoded.
    pub async fn sync_context(&self, event: ContextSyncEvent) -> ContextResult<()> {
        let applied = self.state.apply(event).await?;
        self.state
            .publish(&applied.with_origin(self.state.instance()))
            .await
    }

    /// Returns the entries of `context_id`, or an empty list when the
    /// context does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the store fails or the stored entries
    /// do not decode.
    pub async fn get_shared_context(
        &self,
        context_id: &ContextId,
    ) -> ContextResult<Vec<ContextEntry>> {
        self.state.read_nodes(context_id).await
    }

    /// Snapshots `source` into a new branch for `target`.
    ///
    /// The branch entries are a copy readable under the returned id with
    /// [`ContextManager::get_shared_context`]. Later changes to `source` do
    /// not reach the branch.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the store fails.
    pub async fn create_context_branch(
        &self,
        source: &ContextId,
        target: &ContextId,
    ) -> ContextResult<BranchId> {
        let nodes = self.state.read_nodes(source).await?;
        let branch = ContextBranch::new(
            source.clone(),
            target.clone(),
            nodes,
            self.state.clock().utc(),
        );
        self.state.save_branch(&branch).await?;
        self.state
            .write_nodes(&branch.id().as_context_id(), branch.nodes())
            .await?;
        info!(
            branch_id = %branch.id(),
            context_id = %source,
            entries = branch.nodes().len(),
            "context branch created"
        );
        Ok(branch.id().clone())
    }

    /// Merges the newest branch of `source` for `target` into `target`.
    ///
    /// The branch entries replace the entries of `target` through an
    /// `update` whose metadata carries `mergedFrom`. The branch is deleted
    /// and returned.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::BranchNotFound`] when no branch exists for
    /// the pair, or [`ContextError`] when the store fails.
    pub async fn merge_context_branch(
        &self,
        source: &ContextId,
        target: &ContextId,
    ) -> ContextResult<ContextBranch> {
        let branch = self
            .state
            .branches()
            .await?
            .into_iter()
            .filter(|branch| branch.source_id() == source && branch.target_id() == target)
            .max_by(|left, right| {
                left.created_at()
                    .cmp(&right.created_at())
                    .then_with(|| left.id().cmp(right.id()))
            })
            .ok_or_else(|| ContextError::BranchNotFound {
                source_id: source.clone(),
                target_id: target.clone(),
            })?;
        let merge = ContextSyncEvent::update(
            AgentId::new(target.as_str()),
            target.clone(),
            branch.nodes().to_vec(),
            self.state.clock(),
        )
        .with_metadata("mergedFrom", source.as_str());
        self.sync_context(merge).await?;
        self.state.drop_branch(branch.id()).await?;
        info!(branch_id = %branch.id(), context_id = %target, "context branch merged");
        Ok(branch)
    }

    /// Looks up one branch.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the store fails or the branch does not
    /// decode.
    pub async fn get_branch(&self, id: &BranchId) -> ContextResult<Option<ContextBranch>> {
        self.state.load_branch(id).await
    }

    /// Returns every branch taken from `source`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] when the store fails.
    pub async fn list_branches(&self, source: &ContextId) -> ContextResult<Vec<ContextBranch>> {
        let mut branches: Vec<_> = self
            .state
            .branches()
            .await?
            .into_iter()
            .filter(|branch| branch.source_id() == source)
            .collect();
        branches.sort_by(|left, right| {
            left.created_at()
                .cmp(&right.created_at())
                .then_with(|| left.id().cmp(right.id()))
        });
        Ok(branches)
    }

    /// Stops the channel listener. Stored contexts are left in place.
    ///
    /// Safe to call when never started, and more than once.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] when the listener connection fails to
    /// close.
    pub async fn cleanup(&self) -> ContextResult<()> {
        let listener = lock(&self.listener).take();
        if let Some(listener) = listener {
            debug!(channel = listener.channel(), "closing context listener");
            listener.stop().await?;
            info!("context manager stopped");
        }
        Ok(())
    }
}
