use std::time::Duration;

use gale_net_runner::prelude::*;

const DEFAULT_URL: &str = "https://www.test1.com:8080";

/// Requests the target, then holds the virtual user idle for a second. The response is never
/// checked, so a failed request only shows up as a failed iteration.
fn agent_behaviour(ctx: &mut AgentContext<NetRunnerContext, NetAgentContext>) -> HookResult {
    let response = https_get_target(ctx)?;
    log::trace!(
        "{} got status {} with {} body bytes",
        ctx.agent_id(),
        response.status,
        response.body.len()
    );

    ctx.runner_context().executor().execute_in_place(async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    })
}

fn configure(
    builder: ScenarioDefinitionBuilder<NetRunnerContext, NetAgentContext>,
) -> ScenarioDefinitionBuilder<NetRunnerContext, NetAgentContext> {
    builder
        .with_default_target(DEFAULT_URL)
        .with_default_duration_s(10)
        .use_setup(configure_net_client)
        .use_agent_behaviour(agent_behaviour)
}

fn main() -> GaleResult<()> {
    let builder = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    );

    run(configure(builder))?;

    Ok(())
}
