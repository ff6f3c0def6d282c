//! Tests for traffic between backplanes attached to one store.

use backplane::HandlerError;
use backplane::broker::domain::{AgentMessage, MessageContent, MessageEnvelope};
use backplane::broker::ports::handler_fn;
use backplane::context::domain::{ContextEntry, ContextId, ContextSyncEvent};
use backplane::discovery::domain::{AgentId, AgentInfo, DiscoveryEvent};
use backplane::discovery::ports::watcher_fn;
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;

use super::helpers::{SETTLE, TestStore, connected, drain, store};

#[rstest]
#[tokio::test]
async fn messages_reach_handlers_on_other_backplanes(store: TestStore) {
    let sender = connected(&store, "it:").await.expect("sender");
    let receiver = connected(&store, "it:").await.expect("receiver");
    let (deliveries, mut delivered) = unbounded_channel::<MessageEnvelope>();
    receiver.broker().expect("connected").subscribe(
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
    let message = AgentMessage::new("task", MessageContent::text("build it"), "planner");

    let id = sender
        .send_message(message, AgentId::new("coder"))
        .await
        .expect("send");

    let seen = drain(&mut delivered, SETTLE).await;
    assert_eq!(seen.len(), 1);
    let envelope = seen.first().expect("one delivery");
    assert_eq!(envelope.id(), id);
    assert_eq!(envelope.message().content.as_text(), Some("build it"));
    sender.disconnect().await.expect("disconnect sender");
    receiver.disconnect().await.expect("disconnect receiver");
}

#[rstest]
#[tokio::test]
async fn watchers_see_registrations_from_other_backplanes(store: TestStore) {
    let registrar = connected(&store, "it:").await.expect("registrar");
    let observer = connected(&store, "it:").await.expect("observer");
    let (events, mut seen) = unbounded_channel::<DiscoveryEvent>();
    observer
        .discovery()
        .expect("connected")
        .watch_agents(watcher_fn(move |event| {
            let events = events.clone();
            async move {
                events
                    .send(event)
                    .map_err(|err| HandlerError::new(err.to_string()))
            }
        }));
    let discovery = registrar.discovery().expect("connected");

    discovery
        .register_agent(AgentInfo::new("coder", "developer", &DefaultClock))
        .await
        .expect("register");
    discovery
        .unregister_agent(&AgentId::new("coder"))
        .await
        .expect("unregister");

    let kinds: Vec<&str> = drain(&mut seen, SETTLE)
        .await
        .iter()
        .filter(|event| event.agent_id() == &AgentId::new("coder"))
        .map(DiscoveryEvent::kind)
        .collect();
    assert_eq!(kinds, vec!["add", "remove"]);
    registrar.disconnect().await.expect("disconnect registrar");
    observer.disconnect().await.expect("disconnect observer");
}

#[rstest]
#[tokio::test]
async fn shared_context_is_readable_from_every_backplane(store: TestStore) {
    let writer = connected(&store, "it:").await.expect("writer");
    let reader = connected(&store, "it:").await.expect("reader");
    let nodes = vec![ContextEntry::new(json!({"decision": "use rust"}))];

    writer
        .context()
        .expect("connected")
        .sync_context(ContextSyncEvent::update(
            "planner",
            "design",
            nodes.clone(),
            &DefaultClock,
        ))
        .await
        .expect("sync");
    let branch = writer
        .share_context(
            &AgentId::new("planner"),
            &AgentId::new("coder"),
            &ContextId::new("design"),
        )
        .await
        .expect("share");

    let read_back = reader
        .context()
        .expect("connected")
        .get_shared_context(&branch.as_context_id())
        .await
        .expect("read branch");
    assert_eq!(read_back, nodes);
    writer.disconnect().await.expect("disconnect writer");
    reader.disconnect().await.expect("disconnect reader");
}
