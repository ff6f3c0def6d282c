//! When steps for backplane BDD scenarios.

use backplane::broker::domain::{AgentMessage, MessageContent};
use backplane::context::domain::{ContextId, ContextSyncEvent};
use backplane::discovery::domain::{AgentId, AgentQuery};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::when;

use super::world::{BackplaneWorld, entries, run_async};

#[when(r#"collaborators with capability "{capability}" are requested"#)]
fn collaborators_requested(
    world: &mut BackplaneWorld,
    capability: String,
) -> Result<(), eyre::Report> {
    let query = AgentQuery::new().with_capabilities([capability]);
    world.collaborators =
        run_async(world.backplane.find_collaborators(query)).wrap_err("find collaborators")?;
    Ok(())
}

#[when(r#"agent "{sender}" broadcasts "{text}" to capability "{capability}""#)]
fn agent_broadcasts(
    world: &mut BackplaneWorld,
    sender: String,
    text: String,
    capability: String,
) -> Result<(), eyre::Report> {
    let message = AgentMessage::new("broadcast", MessageContent::text(text), sender);
    let filter = AgentQuery::new().with_capabilities([capability]);
    world.sent =
        run_async(world.backplane.broadcast_message(message, filter)).wrap_err("broadcast")?;
    Ok(())
}

#[when(r#"agent "{source}" shares context "{context}" with agent "{target}""#)]
fn agent_shares_context(
    world: &mut BackplaneWorld,
    source: String,
    context: String,
    target: String,
) -> Result<(), eyre::Report> {
    let branch = run_async(world.backplane.share_context(
        &AgentId::new(source),
        &AgentId::new(target),
        &ContextId::new(context),
    ))
    .wrap_err("share context")?;
    world.branch = Some(branch);
    Ok(())
}

#[when(r#"context "{context}" is replaced with {count:usize} entries"#)]
fn context_replaced(
    world: &mut BackplaneWorld,
    context: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let manager = world.backplane.context()?;
    let event =
        ContextSyncEvent::update("scenario", context.as_str(), entries(count), &DefaultClock);
    run_async(manager.sync_context(event)).wrap_err("replace context")?;
    Ok(())
}

#[when(r#"agent "{sender}" sends "{text}" to agent "{target}""#)]
fn agent_sends(world: &mut BackplaneWorld, sender: String, text: String, target: String) {
    let message = AgentMessage::new("note", MessageContent::text(text), sender);
    match run_async(world.backplane.send_message(message, AgentId::new(target))) {
        Ok(id) => world.sent.push(id),
        Err(err) => world.last_error = Some(err),
    }
}

#[when("the backplane is disconnected twice")]
fn disconnected_twice(world: &mut BackplaneWorld) -> Result<(), eyre::Report> {
    run_async(world.backplane.disconnect()).wrap_err("first disconnect")?;
    run_async(world.backplane.disconnect()).wrap_err("second disconnect")?;
    Ok(())
}
