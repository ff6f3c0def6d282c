//! Given steps for backplane BDD scenarios.

use backplane::context::domain::ContextSyncEvent;
use backplane::discovery::domain::{AgentInfo, AgentStatus};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;

use super::world::{BackplaneWorld, entries, run_async, split_list};

fn register(
    world: &BackplaneWorld,
    id: &str,
    capabilities: &str,
    status: AgentStatus,
) -> Result<(), eyre::Report> {
    let agent = AgentInfo::new(id, "worker", &DefaultClock)
        .with_capabilities(split_list(capabilities))
        .with_status(status);
    let discovery = world.backplane.discovery()?;
    run_async(discovery.register_agent(agent)).wrap_err("register agent for scenario")?;
    Ok(())
}

#[given("a connected backplane")]
fn a_connected_backplane(world: &mut BackplaneWorld) -> Result<(), eyre::Report> {
    run_async(world.backplane.connect()).wrap_err("connect backplane")?;
    Ok(())
}

#[given("a disconnected backplane")]
fn a_disconnected_backplane(world: &mut BackplaneWorld) -> Result<(), eyre::Report> {
    if world.backplane.is_connected() {
        return Err(eyre::eyre!("fresh backplane should start disconnected"));
    }
    Ok(())
}

#[given(r#"an active agent "{id}" with capabilities "{capabilities}""#)]
fn an_active_agent(
    world: &mut BackplaneWorld,
    id: String,
    capabilities: String,
) -> Result<(), eyre::Report> {
    register(world, &id, &capabilities, AgentStatus::Active)
}

#[given(r#"a busy agent "{id}" with capabilities "{capabilities}""#)]
fn a_busy_agent(
    world: &mut BackplaneWorld,
    id: String,
    capabilities: String,
) -> Result<(), eyre::Report> {
    register(world, &id, &capabilities, AgentStatus::Busy)
}

#[given(r#"context "{context}" holds {count:usize} entries"#)]
fn context_holds_entries(
    world: &mut BackplaneWorld,
    context: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let manager = world.backplane.context()?;
    let event =
        ContextSyncEvent::update("scenario", context.as_str(), entries(count), &DefaultClock);
    run_async(manager.sync_context(event)).wrap_err("seed context")?;
    Ok(())
}
