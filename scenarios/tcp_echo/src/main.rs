use gale_net_runner::prelude::*;

const DEFAULT_TARGET: &str = "127.0.0.1:8080";

/// The write opens a fresh connection, which is closed again at the end of the iteration. A
/// target that refuses connections fails only the iteration that tried it.
fn agent_behaviour(ctx: &mut AgentContext<NetRunnerContext, NetAgentContext>) -> HookResult {
    tcp_write_line(ctx, "Say Hello")?;
    let reply = tcp_read_up_to(ctx, 1024)?;

    let passed = ctx.check(&reply[..], "verify ag tag", |reply| {
        String::from_utf8_lossy(reply).contains("Hello")
    });
    if !passed {
        log::debug!(
            "Unexpected reply for {}: {}",
            ctx.agent_id(),
            String::from_utf8_lossy(&reply)
        );
    }

    close_tcp(ctx);

    Ok(())
}

fn main() -> GaleResult<()> {
    let builder = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_target(DEFAULT_TARGET)
    .with_default_duration_s(60)
    .use_setup(configure_net_client)
    .use_agent_behaviour(agent_behaviour)
    .use_agent_teardown(teardown_tcp);

    run(builder)?;

    Ok(())
}
