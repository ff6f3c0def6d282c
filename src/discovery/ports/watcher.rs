//! Callbacks notified of discovery events.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;

use crate::discovery::domain::DiscoveryEvent;
use crate::error::HandlerResult;

/// Receives every event seen on the discovery channel.
///
/// Events reach a watcher one at a time, in channel order. A slow or
/// failing watcher is logged and does not hold up other watchers.
#[async_trait]
pub trait AgentWatcher: Send + Sync {
    /// Handles one discovery event.
    async fn on_event(&self, event: DiscoveryEvent) -> HandlerResult;
}

/// Handle returned by [`watch_agents`](crate::discovery::services::DiscoveryService::watch_agents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(pub(crate) u64);

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher-{}", self.0)
    }
}

/// Watcher backed by an async closure.
pub struct FnWatcher<F>(F);

impl<F> fmt::Debug for FnWatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWatcher").finish_non_exhaustive()
    }
}

/// Wraps an async closure as an [`AgentWatcher`].
pub fn watcher_fn<F, Fut>(callback: F) -> FnWatcher<F>
where
    F: Fn(DiscoveryEvent) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnWatcher(callback)
}

#[async_trait]
impl<F, Fut> AgentWatcher for FnWatcher<F>
where
    F: Fn(DiscoveryEvent) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn on_event(&self, event: DiscoveryEvent) -> HandlerResult {
        (self.0)(event).await
    }
}
