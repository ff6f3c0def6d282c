//! Tests for prefix isolation between backplanes sharing one store.

use backplane::HandlerError;
use backplane::broker::domain::{AgentMessage, MessageContent};
use backplane::broker::ports::handler_fn;
use backplane::context::domain::{ContextEntry, ContextId, ContextSyncEvent};
use backplane::discovery::domain::{AgentId, AgentInfo, AgentQuery};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;

use super::helpers::{SETTLE, TestStore, connected, drain, store};

#[rstest]
#[tokio::test]
async fn agents_are_invisible_across_prefixes(store: TestStore) {
    let team_a = connected(&store, "team-a:").await.expect("team a");
    let team_b = connected(&store, "team-b:").await.expect("team b");

    team_a
        .discovery()
        .expect("connected")
        .register_agent(AgentInfo::new("coder", "developer", &DefaultClock))
        .await
        .expect("register");

    let in_a = team_a
        .find_collaborators(AgentQuery::new())
        .await
        .expect("lookup a");
    let in_b = team_b
        .find_collaborators(AgentQuery::new())
        .await
        .expect("lookup b");
    assert_eq!(in_a.len(), 1);
    assert!(in_b.is_empty());
    team_a.disconnect().await.expect("disconnect a");
    team_b.disconnect().await.expect("disconnect b");
}

#[rstest]
#[tokio::test]
async fn messages_and_contexts_stay_within_their_prefix(store: TestStore) {
    let team_a = connected(&store, "team-a:").await.expect("team a");
    let team_b = connected(&store, "team-b:").await.expect("team b");
    let (deliveries, mut delivered) = unbounded_channel();
    team_b.broker().expect("connected").subscribe(
        AgentId::new("coder"),
        handler_fn(move |envelope| {
            let deliveries = deliveries.clone();
            async move {
                deliveries
                    .send(envelope)
                    .map_err(|err| HandlerError::new(err.to_string()))
            }
        }),
    );

    let id = team_a
        .send_message(
            AgentMessage::new("task", MessageContent::text("hello"), "planner"),
            AgentId::new("coder"),
        )
        .await
        .expect("send");
    team_a
        .context()
        .expect("connected")
        .sync_context(ContextSyncEvent::update(
            "planner",
            "plan",
            vec![ContextEntry::new(json!(1))],
            &DefaultClock,
        ))
        .await
        .expect("sync");

    assert!(drain(&mut delivered, SETTLE).await.is_empty());
    let broker_b = team_b.broker().expect("connected");
    assert_eq!(broker_b.get_message(id).await.expect("lookup"), None);
    let context_b = team_b
        .context()
        .expect("connected")
        .get_shared_context(&ContextId::new("plan"))
        .await
        .expect("read");
    assert!(context_b.is_empty());
    team_a.disconnect().await.expect("disconnect a");
    team_b.disconnect().await.expect("disconnect b");
}
