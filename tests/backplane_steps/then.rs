//! Then steps for backplane BDD scenarios.

use backplane::BackplaneError;
use backplane::context::domain::ContextId;
use rstest_bdd_macros::then;

use super::world::{BackplaneWorld, run_async, split_list};

#[then(r#"the collaborators are "{ids}""#)]
fn collaborators_are(world: &mut BackplaneWorld, ids: String) -> Result<(), eyre::Report> {
    let mut found: Vec<String> = world
        .collaborators
        .iter()
        .map(|agent| agent.id().as_str().to_owned())
        .collect();
    found.sort();
    let expected = split_list(&ids);
    if found != expected {
        return Err(eyre::eyre!("expected collaborators {expected:?}, found {found:?}"));
    }
    Ok(())
}

#[then("{count:usize} envelopes were sent")]
fn envelopes_sent(world: &mut BackplaneWorld, count: usize) -> Result<(), eyre::Report> {
    if world.sent.len() != count {
        return Err(eyre::eyre!(
            "expected {count} envelopes, found {}",
            world.sent.len()
        ));
    }
    Ok(())
}

#[then(r#"the envelopes target "{ids}""#)]
fn envelopes_target(world: &mut BackplaneWorld, ids: String) -> Result<(), eyre::Report> {
    let broker = world.backplane.broker()?;
    let mut targets = Vec::new();
    for id in &world.sent {
        let envelope = run_async(broker.get_message(*id))
            .map_err(|err| eyre::eyre!("get_message failed: {err}"))?
            .ok_or_else(|| eyre::eyre!("envelope {id} was not stored"))?;
        targets.push(envelope.routing().target.as_str().to_owned());
    }
    targets.sort();
    let expected = split_list(&ids);
    if targets != expected {
        return Err(eyre::eyre!("expected targets {expected:?}, found {targets:?}"));
    }
    Ok(())
}

#[then("the shared branch holds {count:usize} entries")]
fn shared_branch_holds(world: &mut BackplaneWorld, count: usize) -> Result<(), eyre::Report> {
    let branch = world
        .branch
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no branch in scenario world"))?;
    let manager = world.backplane.context()?;
    let nodes = run_async(manager.get_shared_context(&branch.as_context_id()))
        .map_err(|err| eyre::eyre!("read branch failed: {err}"))?;
    if nodes.len() != count {
        return Err(eyre::eyre!(
            "expected {count} branch entries, found {}",
            nodes.len()
        ));
    }
    Ok(())
}

#[then(r#"merging "{source}" into "{target}" leaves "{merged}" with {count:usize} entries"#)]
fn merging_leaves_entries(
    world: &mut BackplaneWorld,
    source: String,
    target: String,
    merged: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let manager = world.backplane.context()?;
    run_async(manager.merge_context_branch(&ContextId::new(source), &ContextId::new(target)))
        .map_err(|err| eyre::eyre!("merge failed: {err}"))?;
    let nodes = run_async(manager.get_shared_context(&ContextId::new(merged)))
        .map_err(|err| eyre::eyre!("read merged context failed: {err}"))?;
    if nodes.len() != count {
        return Err(eyre::eyre!(
            "expected {count} merged entries, found {}",
            nodes.len()
        ));
    }
    Ok(())
}

#[then(r#"merging "{source}" into "{target}" a second time fails with not found"#)]
fn merging_again_fails(
    world: &mut BackplaneWorld,
    source: String,
    target: String,
) -> Result<(), eyre::Report> {
    let manager = world.backplane.context()?;
    let result =
        run_async(manager.merge_context_branch(&ContextId::new(source), &ContextId::new(target)));
    match result.map_err(BackplaneError::from) {
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(eyre::eyre!("expected not found, got {err}")),
        Ok(_) => Err(eyre::eyre!("second merge unexpectedly succeeded")),
    }
}

#[then("the operation fails because the backplane is not connected")]
fn fails_not_connected(world: &BackplaneWorld) -> Result<(), eyre::Report> {
    match &world.last_error {
        Some(BackplaneError::NotConnected) => Ok(()),
        Some(other) => Err(eyre::eyre!("expected NotConnected, got {other}")),
        None => Err(eyre::eyre!("operation unexpectedly succeeded")),
    }
}

#[then("no store connections remain open")]
fn no_connections_remain(world: &BackplaneWorld) -> Result<(), eyre::Report> {
    let open = world.store.open_connections();
    if open != 0 {
        return Err(eyre::eyre!("expected no open connections, found {open}"));
    }
    Ok(())
}
