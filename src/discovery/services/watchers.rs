//! Local watcher list and event fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::background::CallbackQueue;
use crate::discovery::domain::DiscoveryEvent;
use crate::discovery::ports::{AgentWatcher, WatcherId};
use crate::sync::{read, write};

/// Registered watchers, each fed through its own ordered queue.
#[derive(Default)]
pub(crate) struct WatcherSet {
    next_id: AtomicU64,
    watchers: RwLock<Vec<(WatcherId, CallbackQueue<DiscoveryEvent>)>>,
}

impl WatcherSet {
    pub(crate) fn add(&self, watcher: Arc<dyn AgentWatcher>) -> WatcherId {
        let id = WatcherId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = CallbackQueue::spawn("watcher", id.to_string(), move |event: DiscoveryEvent| {
            let current = Arc::clone(&watcher);
            async move { current.on_event(event).await }
        });
        write(&self.watchers).push((id, queue));
        id
    }

    /// Drops the watcher and its queue. Events already queued for it are
    /// discarded.
    pub(crate) fn remove(&self, id: WatcherId) -> bool {
        let mut watchers = write(&self.watchers);
        let before = watchers.len();
        watchers.retain(|(existing, _)| *existing != id);
        watchers.len() != before
    }

    /// Forgets every watcher and waits for their queues to stop.
    pub(crate) async fn shutdown(&self) {
        let queues = std::mem::take(&mut *write(&self.watchers));
        for (_, queue) in queues {
            queue.stop().await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.watchers).len()
    }

    /// Decodes `payload` and queues the event for every watcher. Undecodable
    /// payloads are dropped.
    pub(crate) fn dispatch_payload(&self, payload: &str) {
        match serde_json::from_str::<DiscoveryEvent>(payload) {
            Ok(event) => self.dispatch(&event),
            Err(err) => warn!(error = %err, "dropping malformed discovery event"),
        }
    }

    pub(crate) fn dispatch(&self, event: &DiscoveryEvent) {
        let watchers = read(&self.watchers);
        debug!(
            agent_id = %event.agent_id(),
            kind = event.kind(),
            watchers = watchers.len(),
            "dispatching discovery event"
        );
        for (id, queue) in &*watchers {
            if !queue.push(event.clone()) {
                debug!(watcher = %id, "watcher queue already stopped");
            }
        }
    }
}
