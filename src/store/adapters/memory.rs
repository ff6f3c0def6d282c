//! In-memory store shared by every connection opened from one hub.
//!
//! Connections opened from the same [`InMemoryStore`] see the same keys and
//! channels, so several backplanes in one process behave like several
//! processes attached to one store server. Expiry is evaluated lazily
//! against the injected clock.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::ports::{
    StoreConnection, StoreConnector, StoreEndpoint, StoreError, StoreResult, Subscription,
};

/// Payloads buffered per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

struct Hub<C> {
    clock: Arc<C>,
    entries: RwLock<BTreeMap<String, StoredValue>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
    open_connections: AtomicUsize,
    reachable: AtomicBool,
}

fn poisoned(err: impl fmt::Display) -> StoreError {
    StoreError::backend(std::io::Error::other(err.to_string()))
}

impl<C: Clock + Send + Sync + 'static> Hub<C> {
    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| self.now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn open(self: &Arc<Self>) -> InMemoryConnection<C> {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        InMemoryConnection {
            hub: Arc::clone(self),
            open: AtomicBool::new(true),
            closed: CancellationToken::new(),
            subscribed: AtomicBool::new(false),
        }
    }
}

/// Shared in-memory store hub.
///
/// Cloning the store yields another handle on the same hub.
pub struct InMemoryStore<C: Clock + Send + Sync + 'static> {
    hub: Arc<Hub<C>>,
}

impl<C: Clock + Send + Sync + 'static> InMemoryStore<C> {
    /// Creates an empty store whose expiry follows `clock`.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            hub: Arc::new(Hub {
                clock,
                entries: RwLock::new(BTreeMap::new()),
                channels: RwLock::new(HashMap::new()),
                open_connections: AtomicUsize::new(0),
                reachable: AtomicBool::new(true),
            }),
        }
    }

    /// Returns how many connections are open and not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.hub.open_connections.load(Ordering::SeqCst)
    }

    /// Makes new connection attempts fail (or succeed again).
    ///
    /// Connections that are already open are unaffected.
    pub fn set_reachable(&self, reachable: bool) {
        self.hub.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns the remaining lifetime of `key`, or `None` when it is absent
    /// or expired.
    #[must_use]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = self.hub.now();
        let entries = self.hub.entries.read().ok()?;
        let stored = entries.get(key)?;
        (stored.expires_at - now).to_std().ok().filter(|left| !left.is_zero())
    }
}

impl<C: Clock + Send + Sync + 'static> Clone for InMemoryStore<C> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<C: Clock + Send + Sync + 'static> fmt::Debug for InMemoryStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("open_connections", &self.open_connections())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Clock + Send + Sync + 'static> StoreConnector for InMemoryStore<C> {
    type Connection = InMemoryConnection<C>;

    async fn connect(&self, endpoint: &StoreEndpoint) -> StoreResult<Self::Connection> {
        if !self.hub.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable {
                endpoint: endpoint.to_string(),
            });
        }
        debug!(%endpoint, "opened in-memory store connection");
        Ok(self.hub.open())
    }
}

/// One connection to an [`InMemoryStore`].
pub struct InMemoryConnection<C: Clock + Send + Sync + 'static> {
    hub: Arc<Hub<C>>,
    open: AtomicBool,
    closed: CancellationToken,
    subscribed: AtomicBool,
}

impl<C: Clock + Send + Sync + 'static> InMemoryConnection<C> {
    fn ensure_command_mode(&self) -> StoreResult<()> {
        if self.closed.is_cancelled() {
            return Err(StoreError::Closed);
        }
        if self.subscribed.load(Ordering::SeqCst) {
            return Err(StoreError::SubscriberMode);
        }
        Ok(())
    }
}

impl<C: Clock + Send + Sync + 'static> fmt::Debug for InMemoryConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryConnection")
            .field("closed", &self.closed.is_cancelled())
            .field("subscribed", &self.subscribed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: Clock + Send + Sync + 'static> StoreConnection for InMemoryConnection<C> {
    type Subscription = InMemorySubscription;

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_command_mode()?;
        let now = self.hub.now();
        let mut entries = self.hub.entries.write().map_err(poisoned)?;
        match entries.get(key) {
            None => return Ok(None),
            Some(stored) if stored.expires_at > now => return Ok(Some(stored.value.clone())),
            Some(_) => {}
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.ensure_command_mode()?;
        let expires_at = self.hub.expiry(ttl);
        let mut entries = self.hub.entries.write().map_err(poisoned)?;
        entries.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_command_mode()?;
        let now = self.hub.now();
        let mut entries = self.hub.entries.write().map_err(poisoned)?;
        Ok(entries
            .remove(key)
            .is_some_and(|stored| stored.expires_at > now))
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.ensure_command_mode()?;
        let now = self.hub.now();
        let mut entries = self.hub.entries.write().map_err(poisoned)?;
        entries.retain(|_, stored| stored.expires_at > now);
        Ok(entries
            .range(prefix.to_owned()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize> {
        self.ensure_command_mode()?;
        let channels = self.hub.channels.read().map_err(poisoned)?;
        let delivered = channels
            .get(channel)
            .and_then(|sender| sender.send(payload.to_owned()).ok())
            .unwrap_or(0);
        Ok(delivered)
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Self::Subscription> {
        if self.closed.is_cancelled() {
            return Err(StoreError::Closed);
        }
        let receiver = {
            let mut channels = self.hub.channels.write().map_err(poisoned)?;
            channels
                .entry(channel.to_owned())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(InMemorySubscription {
            channel: channel.to_owned(),
            receiver,
            closed: self.closed.clone(),
        })
    }

    async fn duplicate(&self) -> StoreResult<Self> {
        if self.closed.is_cancelled() {
            return Err(StoreError::Closed);
        }
        Ok(self.hub.open())
    }

    async fn close(&self) -> StoreResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.closed.cancel();
            self.hub.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Subscription on one in-memory channel.
#[derive(Debug)]
pub struct InMemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
    closed: CancellationToken,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_payload(&mut self) -> Option<String> {
        loop {
            tokio::select! {
                biased;
                () = self.closed.cancelled() => return None,
                received = self.receiver.recv() => match received {
                    Ok(payload) => return Some(payload),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            channel = %self.channel,
                            skipped,
                            "subscriber lagged; payloads dropped"
                        );
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }
}
