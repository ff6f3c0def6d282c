//! Shared world state for backplane BDD scenarios.

use std::sync::Arc;

use backplane::broker::domain::EnvelopeId;
use backplane::context::domain::{BranchId, ContextEntry};
use backplane::discovery::domain::AgentInfo;
use backplane::store::adapters::InMemoryStore;
use backplane::{Backplane, BackplaneConfig, BackplaneError};
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;

/// Store type used by the BDD world.
pub type TestStore = InMemoryStore<DefaultClock>;

/// Backplane type used by the BDD world.
pub type TestBackplane = Backplane<TestStore, DefaultClock>;

/// Scenario world for backplane behaviour tests.
pub struct BackplaneWorld {
    /// Store shared by the scenario.
    pub store: TestStore,
    /// The backplane under test.
    pub backplane: TestBackplane,
    /// Envelope ids returned by the last send or broadcast.
    pub sent: Vec<EnvelopeId>,
    /// Result of the last collaborator lookup.
    pub collaborators: Vec<AgentInfo>,
    /// Branch created by the last share.
    pub branch: Option<BranchId>,
    /// Error returned by the last failing operation.
    pub last_error: Option<BackplaneError>,
}

impl BackplaneWorld {
    /// Creates a world with a disconnected backplane on a fresh store.
    #[must_use]
    pub fn new() -> Self {
        let store = InMemoryStore::new(Arc::new(DefaultClock));
        let backplane = Backplane::new(
            store.clone(),
            BackplaneConfig::default().with_prefix("bdd:"),
            Arc::new(DefaultClock),
        );
        Self {
            store,
            backplane,
            sent: Vec::new(),
            collaborators: Vec::new(),
            branch: None,
            last_error: None,
        }
    }
}

impl Default for BackplaneWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BackplaneWorld {
    BackplaneWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Builds `count` distinct context entries.
pub fn entries(count: usize) -> Vec<ContextEntry> {
    (0..count)
        .map(|index| ContextEntry::new(json!({ "index": index })))
        .collect()
}

/// Splits a comma-separated step argument.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
