//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::BackplaneConfig;
use crate::discovery::domain::DiscoveryEvent;
use crate::discovery::ports::{AgentWatcher, watcher_fn};
use crate::error::HandlerError;
use crate::store::adapters::memory::{InMemoryConnection, InMemoryStore};
use crate::store::ports::{StoreConnector, StoreEndpoint};
use crate::sync::lock;

/// Clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        let mut now = lock(&self.now);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

pub(crate) type TestStore = InMemoryStore<ManualClock>;
pub(crate) type TestConnection = InMemoryConnection<ManualClock>;

pub(crate) fn store_with_clock() -> (TestStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (InMemoryStore::new(Arc::clone(&clock)), clock)
}

pub(crate) async fn open(store: &TestStore) -> Arc<TestConnection> {
    let connection = store
        .connect(&StoreEndpoint::new("localhost", 6379))
        .await
        .expect("in-memory store accepts connections");
    Arc::new(connection)
}

pub(crate) fn config() -> BackplaneConfig {
    BackplaneConfig::default().with_prefix("unit:")
}

/// Returns a sender/receiver pair used to observe handler invocations.
pub(crate) fn recorder<T>() -> (UnboundedSender<T>, UnboundedReceiver<T>) {
    unbounded_channel()
}

/// Waits up to `within` for the next item on `receiver`.
pub(crate) async fn next_within<T>(
    receiver: &mut UnboundedReceiver<T>,
    within: Duration,
) -> Option<T> {
    tokio::time::timeout(within, receiver.recv())
        .await
        .ok()
        .flatten()
}

/// Watcher forwarding every event into `sender`.
pub(crate) fn recording_watcher(sender: UnboundedSender<DiscoveryEvent>) -> impl AgentWatcher {
    watcher_fn(move |event| {
        let sender = sender.clone();
        async move {
            sender
                .send(event)
                .map_err(|err| HandlerError::new(err.to_string()))
        }
    })
}

/// Collects whatever arrives on `receiver` within `within`.
pub(crate) async fn drain_within<T>(
    receiver: &mut UnboundedReceiver<T>,
    within: Duration,
) -> Vec<T> {
    let mut items = Vec::new();
    while let Some(item) = next_within(receiver, within).await {
        items.push(item);
    }
    items
}

/// Polls `check` until it holds or roughly a second has passed.
pub(crate) async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
