//! Tests for connect, rollback, and disconnect.

use std::sync::Arc;

use backplane::discovery::domain::AgentQuery;
use backplane::{Backplane, BackplaneError};
use mockable::DefaultClock;
use rstest::rstest;

use super::helpers::{FlakyConnector, TestStore, config, new_backplane, store};

#[rstest]
#[case::broker_channel("it:messages")]
#[case::context_channel("it:context")]
#[case::discovery_channel("it:discovery")]
#[tokio::test]
async fn failed_connect_rolls_back_every_connection(store: TestStore, #[case] channel: &str) {
    let connector = FlakyConnector::new(store.clone(), channel);
    let facade = Backplane::new(connector.clone(), config("it:"), Arc::new(DefaultClock));

    let result = facade.connect().await;

    assert!(result.is_err_and(|err| err.is_transport_failure()));
    assert!(!facade.is_connected());
    assert_eq!(store.open_connections(), 0);

    connector.heal();
    facade.connect().await.expect("retry should connect");
    assert!(facade.is_connected());
    facade.disconnect().await.expect("disconnect");
    assert_eq!(store.open_connections(), 0);
}

#[rstest]
#[tokio::test]
async fn disconnected_backplane_refuses_work(store: TestStore) {
    let facade = new_backplane(&store, "it:");
    facade.connect().await.expect("connect");
    facade.disconnect().await.expect("disconnect");

    let result = facade.find_collaborators(AgentQuery::new()).await;

    assert!(matches!(result, Err(BackplaneError::NotConnected)));
    assert!(facade.broker().is_err());
    assert!(facade.context().is_err());
}

#[rstest]
#[tokio::test]
async fn cleanup_twice_is_harmless(store: TestStore) {
    let facade = new_backplane(&store, "it:");
    facade.connect().await.expect("connect");

    facade.cleanup().await.expect("first cleanup");
    facade.cleanup().await.expect("second cleanup");

    assert_eq!(store.open_connections(), 0);
}

#[rstest]
#[tokio::test]
async fn reconnecting_after_disconnect_restores_service(store: TestStore) {
    let facade = new_backplane(&store, "it:");
    facade.connect().await.expect("connect");
    facade.disconnect().await.expect("disconnect");

    facade.connect().await.expect("reconnect");

    let collaborators = facade
        .find_collaborators(AgentQuery::new())
        .await
        .expect("lookup after reconnect");
    assert!(collaborators.is_empty());
    facade.disconnect().await.expect("disconnect");
}
