use anyhow::Context;
use bytes::Bytes;
use gale_net_client::prelude::{HttpsResponse, NetClient};
use gale_runner::prelude::{
    AgentContext, GaleResult, HookResult, RunnerContext, UserValuesConstraint,
};

use crate::context::NetAgentContext;
use crate::runner_context::NetRunnerContext;

/// Build the [NetClient] for this run from the run's I/O timeout and TLS policy.
///
/// Use this as the scenario `setup` hook, or call it from yours:
/// ```rust
/// use gale_net_runner::prelude::{configure_net_client, HookResult, NetRunnerContext, RunnerContext};
///
/// fn setup(ctx: &mut RunnerContext<NetRunnerContext>) -> HookResult {
///     configure_net_client(ctx)?;
///     Ok(())
/// }
/// ```
pub fn configure_net_client(ctx: &mut RunnerContext<NetRunnerContext>) -> HookResult {
    let client = NetClient::new(
        ctx.reporter(),
        ctx.connections(),
        ctx.options().io_timeout,
        &ctx.options().tls,
    )
    .context("Failed to configure the network client")?;
    ctx.get_mut().set_client(client);

    Ok(())
}

/// Open a new TCP connection to the run's target, replacing any connection the virtual user
/// already holds.
///
/// The target comes from `--target` and must be a `host:port` address.
pub fn connect_tcp<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
) -> GaleResult<()> {
    close_tcp(ctx);

    let address = ctx
        .runner_context()
        .get_connection_string()
        .context("No target address, pass --target host:port")?
        .to_string();
    let client = ctx.runner_context().get().client()?.clone();

    let connection = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move { Ok(client.connect_tcp(&address).await?) })?;
    ctx.get_mut().tcp = Some(connection);

    Ok(())
}

/// Write a line on the virtual user's TCP connection.
///
/// If the virtual user has no open connection, for example because an earlier operation failed
/// and closed it, a fresh one is opened first.
pub fn tcp_write_line<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
    text: &str,
) -> GaleResult<()> {
    ensure_tcp_connection(ctx)?;

    let runner_context = ctx.runner_context().clone();
    let connection = ctx
        .get_mut()
        .tcp
        .as_mut()
        .context("No TCP connection")?;

    runner_context
        .executor()
        .execute_in_place(async move { Ok(connection.write_line(text).await?) })
}

/// Read up to `max_bytes` from the virtual user's TCP connection.
pub fn tcp_read_up_to<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
    max_bytes: usize,
) -> GaleResult<Bytes> {
    let runner_context = ctx.runner_context().clone();
    let connection = ctx
        .get_mut()
        .tcp
        .as_mut()
        .context("No TCP connection, write before reading")?;

    runner_context
        .executor()
        .execute_in_place(async move { Ok(connection.read_up_to(max_bytes).await?) })
}

/// Close the virtual user's TCP connection, if it has one.
///
/// Safe to call at any time. Use it in the agent teardown so that nothing is left open.
pub fn close_tcp<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
) {
    if let Some(mut connection) = ctx.get_mut().tcp.take() {
        connection.close();
    }
}

/// Agent teardown hook that closes the virtual user's TCP connection.
pub fn teardown_tcp<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
) -> HookResult {
    close_tcp(ctx);
    Ok(())
}

/// Fetch `url` over HTTPS using the run's TLS policy.
pub fn https_get<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
    url: &str,
) -> GaleResult<HttpsResponse> {
    let client = ctx.runner_context().get().client()?.clone();
    let url = url.to_string();

    ctx.runner_context()
        .executor()
        .execute_in_place(async move { Ok(client.https_get(&url).await?) })
}

/// Fetch the run's target URL over HTTPS.
pub fn https_get_target<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
) -> GaleResult<HttpsResponse> {
    let url = ctx
        .runner_context()
        .get_connection_string()
        .context("No target URL, pass --target https://host:port/path")?
        .to_string();

    https_get(ctx, &url)
}

fn ensure_tcp_connection<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<NetRunnerContext, NetAgentContext<SV>>,
) -> GaleResult<()> {
    if ctx.get().tcp.as_ref().is_some_and(|c| c.is_open()) {
        return Ok(());
    }

    log::debug!("Opening a fresh TCP connection for {}", ctx.agent_id());
    connect_tcp(ctx)
}
