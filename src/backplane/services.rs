//! The set of services one connected backplane runs.

use std::sync::Arc;

use mockable::Clock;
use tracing::warn;

use crate::broker::services::MessageBroker;
use crate::config::BackplaneConfig;
use crate::context::ports::ContextPruner;
use crate::context::services::ContextManager;
use crate::discovery::services::DiscoveryService;
use crate::error::{BackplaneError, BackplaneResult};
use crate::store::ports::StoreConnection;

/// Services sharing one command connection.
pub(super) struct Services<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    pub(super) connection: Arc<S>,
    pub(super) discovery: Arc<DiscoveryService<S, C>>,
    pub(super) broker: Arc<MessageBroker<S>>,
    pub(super) context: Arc<ContextManager<S, C>>,
}

impl<S, C> Services<S, C>
where
    S: StoreConnection,
    C: Clock + Send + Sync + 'static,
{
    pub(super) fn new(
        connection: S,
        config: &BackplaneConfig,
        clock: &Arc<C>,
        pruner: Arc<dyn ContextPruner>,
    ) -> Self {
        let shared = Arc::new(connection);
        Self {
            discovery: Arc::new(DiscoveryService::new(
                Arc::clone(&shared),
                config,
                Arc::clone(clock),
            )),
            broker: Arc::new(MessageBroker::new(Arc::clone(&shared), config)),
            context: Arc::new(ContextManager::with_pruner(
                Arc::clone(&shared),
                config,
                Arc::clone(clock),
                pruner,
            )),
            connection: shared,
        }
    }

    /// Starts discovery, the broker, and the context manager in that order.
    pub(super) async fn start(&self) -> BackplaneResult<()> {
        self.discovery.start().await?;
        self.broker.start().await?;
        self.context.start().await?;
        Ok(())
    }

    /// Stops every service and closes the shared connection.
    ///
    /// Every step runs even when an earlier one fails; the first failure is
    /// returned.
    pub(super) async fn shutdown(&self) -> BackplaneResult<()> {
        let steps = [
            ("context", self.context.cleanup().await.map_err(BackplaneError::from)),
            ("broker", self.broker.cleanup().await.map_err(BackplaneError::from)),
            ("discovery", self.discovery.cleanup().await.map_err(BackplaneError::from)),
            ("connection", self.connection.close().await.map_err(BackplaneError::from)),
        ];
        let mut first = None;
        for (step, result) in steps {
            if let Err(err) = result {
                warn!(step, error = %err, "backplane shutdown step failed");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}
