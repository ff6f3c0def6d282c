//! Shared test helpers for in-memory backplane integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backplane::store::adapters::{InMemoryConnection, InMemoryStore, InMemorySubscription};
use backplane::store::ports::{
    StoreConnection, StoreConnector, StoreEndpoint, StoreError, StoreResult,
};
use backplane::{Backplane, BackplaneConfig};
use mockable::DefaultClock;
use rstest::fixture;
use tokio::sync::mpsc::UnboundedReceiver;

/// Store type shared by every backplane in a test.
pub type TestStore = InMemoryStore<DefaultClock>;

/// Backplane attached to a [`TestStore`].
pub type TestBackplane = Backplane<TestStore, DefaultClock>;

/// How long to wait for asynchronous deliveries.
pub const SETTLE: Duration = Duration::from_millis(250);

/// Provides a fresh in-memory store for each test.
#[fixture]
pub fn store() -> TestStore {
    InMemoryStore::new(Arc::new(DefaultClock))
}

/// Builds a configuration under `prefix`.
pub fn config(prefix: &str) -> BackplaneConfig {
    BackplaneConfig::default().with_prefix(prefix)
}

/// Builds a disconnected backplane on `store` under `prefix`.
pub fn new_backplane(store: &TestStore, prefix: &str) -> TestBackplane {
    Backplane::new(store.clone(), config(prefix), Arc::new(DefaultClock))
}

/// Builds and connects a backplane on `store` under `prefix`.
///
/// # Errors
///
/// Returns the connection failure.
pub async fn connected(store: &TestStore, prefix: &str) -> eyre::Result<TestBackplane> {
    let facade = new_backplane(store, prefix);
    facade.connect().await?;
    Ok(facade)
}

/// Collects everything `receiver` yields within `within`.
pub async fn drain<T>(receiver: &mut UnboundedReceiver<T>, within: Duration) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(Some(item)) = tokio::time::timeout(within, receiver.recv()).await {
        items.push(item);
    }
    items
}

/// Connector whose connections refuse to subscribe to one channel while
/// the shared failure switch is on.
#[derive(Clone)]
pub struct FlakyConnector {
    inner: TestStore,
    failing_channel: String,
    failing: Arc<AtomicBool>,
}

impl FlakyConnector {
    /// Wraps `inner`, failing subscriptions to `failing_channel`.
    pub fn new(inner: TestStore, failing_channel: impl Into<String>) -> Self {
        Self {
            inner,
            failing_channel: failing_channel.into(),
            failing: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Lets subscriptions succeed from now on.
    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn wrap(&self, connection: InMemoryConnection<DefaultClock>) -> FlakyConnection {
        FlakyConnection {
            inner: connection,
            failing_channel: self.failing_channel.clone(),
            failing: Arc::clone(&self.failing),
        }
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    type Connection = FlakyConnection;

    async fn connect(&self, endpoint: &StoreEndpoint) -> StoreResult<FlakyConnection> {
        let connection = self.inner.connect(endpoint).await?;
        Ok(self.wrap(connection))
    }
}

/// Connection produced by [`FlakyConnector`].
pub struct FlakyConnection {
    inner: InMemoryConnection<DefaultClock>,
    failing_channel: String,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl StoreConnection for FlakyConnection {
    type Subscription = InMemorySubscription;

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys(prefix).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize> {
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<InMemorySubscription> {
        if self.failing.load(Ordering::SeqCst) && channel == self.failing_channel {
            return Err(StoreError::backend(std::io::Error::other(format!(
                "subscription to {channel} refused"
            ))));
        }
        self.inner.subscribe(channel).await
    }

    async fn duplicate(&self) -> StoreResult<Self> {
        Ok(Self {
            inner: self.inner.duplicate().await?,
            failing_channel: self.failing_channel.clone(),
            failing: Arc::clone(&self.failing),
        })
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
