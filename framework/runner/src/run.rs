use std::sync::Arc;

use anyhow::Context;
use gale_core::prelude::{
    AgentBailError, CipherSuites, DelegatedShutdownListener, NetError, ShutdownSignalError,
};
use gale_instruments::ReportConfig;
use gale_summary_model::RunSummary;

use crate::cli::ReporterOpt;
use crate::context::{AgentContext, PhaseCell, RunPhase, RunnerContext, UserValuesConstraint};
use crate::definition::{AgentHookMut, ScenarioDefinitionBuilder};
use crate::executor::Executor;
use crate::options::RunOptions;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// Run a scenario to completion and return its summary.
///
/// The options are validated before anything starts, so an invalid configuration returns a
/// [crate::options::ConfigError] without running any hooks. Once started, errors from virtual
/// users are recorded in the summary rather than returned. The run only fails after starting if
/// the global setup hook fails, a virtual user thread cannot be spawned or a virtual user panics.
///
/// Every virtual user has stopped, and dropped its connections, by the time this returns.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let options = definition.options.clone();

    log::info!(
        "Running scenario {} with {} virtual users for {:?}",
        definition.name,
        options.virtual_users,
        options.duration
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime));
    let reporter = Arc::new(match options.reporter {
        ReporterOpt::InMemory => ReportConfig::default().enable_in_memory().init(),
        ReporterOpt::Noop => ReportConfig::default().init(),
    });
    let phase = PhaseCell::new();
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        options.clone(),
        phase.clone(),
    );
    let started_at = chrono::Utc::now().timestamp();

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);
    phase.set(RunPhase::Starting);

    // The deadline is fixed now, before any virtual user starts.
    {
        let shutdown_handle = shutdown_handle.clone();
        let duration = options.duration;
        runner_context.executor().spawn(async move {
            tokio::time::sleep(duration).await;
            log::debug!("Run duration elapsed");
            shutdown_handle.shutdown();
        });
    }
    {
        let phase = phase.clone();
        let mut listener = shutdown_handle.new_listener();
        runner_context.executor().spawn(async move {
            listener.wait_for_shutdown().await;
            phase.drain();
        });
    }

    if !options.no_progress {
        start_progress(
            options.duration,
            runner_context.checks().clone(),
            shutdown_handle.new_listener(),
        );
    }

    let hooks = AgentHooks {
        setup: definition.setup_agent_fn,
        behaviour: definition.agent_behaviour,
        teardown: definition.teardown_agent_fn,
    };

    let mut handles = Vec::with_capacity(options.virtual_users);
    let mut spawn_error = None;
    for virtual_user_id in 0..options.virtual_users {
        let context = AgentContext::<RV, V>::new(
            virtual_user_id,
            runner_context.clone(),
            shutdown_handle.new_listener(),
        );
        let cycle_listener = shutdown_handle.new_listener();
        let hooks = hooks.clone();
        let agent_id = context.agent_id().to_string();

        match std::thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || run_virtual_user(context, hooks, cycle_listener))
        {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                log::error!("Failed to spawn thread for virtual user {agent_id}: {e:?}");
                spawn_error = Some(anyhow::Error::new(e).context(format!(
                    "Failed to spawn thread for virtual user {agent_id}"
                )));
                break;
            }
        }
    }

    if spawn_error.is_some() {
        // Stop the virtual users that did start so that they close their connections before
        // the error is returned.
        shutdown_handle.shutdown();
    } else {
        phase.advance(RunPhase::Starting, RunPhase::Running);
    }

    let mut virtual_user_end_count = 0;
    let mut panicked = Vec::new();
    for handle in handles {
        let name = handle.thread().name().unwrap_or("vu").to_string();
        match handle.join() {
            Ok(true) => virtual_user_end_count += 1,
            Ok(false) => {}
            Err(e) => panicked.push(format!("{name}: {e:?}")),
        }
    }

    // Make sure background observers, like the progress bar, stop even if the deadline did not
    // fire because every virtual user stopped early.
    shutdown_handle.shutdown();
    phase.set(RunPhase::Done);

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    if let Some(e) = spawn_error {
        return Err(e);
    }
    if !panicked.is_empty() {
        anyhow::bail!("Virtual user panicked: {}", panicked.join(", "));
    }

    let summary = build_summary(
        &definition.name,
        started_at,
        &options,
        &runner_context,
        virtual_user_end_count,
    );
    runner_context.reporter().finalize(&summary.checks);

    log::info!(
        "Scenario {} finished: {} iterations, {} failed, {} connections left open",
        definition.name,
        summary.iterations,
        summary.total_failed_iterations(),
        summary.open_connections()
    );

    Ok(summary)
}

struct AgentHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    setup: Option<AgentHookMut<RV, V>>,
    behaviour: Option<AgentHookMut<RV, V>>,
    teardown: Option<AgentHookMut<RV, V>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for AgentHooks<RV, V> {
    fn clone(&self) -> Self {
        Self {
            setup: self.setup,
            behaviour: self.behaviour,
            teardown: self.teardown,
        }
    }
}

/// Drive one virtual user until the run stops, it bails or it reaches its iteration cap.
///
/// Returns true if the virtual user was still healthy when it stopped.
fn run_virtual_user<RV: UserValuesConstraint, V: UserValuesConstraint>(
    mut context: AgentContext<RV, V>,
    hooks: AgentHooks<RV, V>,
    cycle_listener: DelegatedShutdownListener,
) -> bool {
    let agent_id = context.agent_id().to_string();
    let runner_context = context.runner_context().clone();
    let options = runner_context.options();

    let mut healthy = true;
    if let Some(setup_agent_fn) = hooks.setup {
        if let Err(e) = setup_agent_fn(&mut context) {
            log::error!("Agent setup failed for virtual user {}: {:?}", agent_id, e);
            healthy = false;
        }
    }

    if let (true, Some(behaviour)) = (healthy, hooks.behaviour) {
        loop {
            if cycle_listener.should_shutdown() {
                log::debug!("Stopping virtual user {}", agent_id);
                break;
            }
            if options.iterations.is_some_and(|max| context.iteration() >= max) {
                log::debug!("Virtual user {} reached its iteration cap", agent_id);
                break;
            }

            match behaviour(&mut context) {
                Ok(()) => runner_context.checks().record_iteration(None),
                Err(e) if e.is::<ShutdownSignalError>() => {
                    // Expected if the behaviour gave up because the run is stopping. The check at
                    // the top of the loop will catch this and break out.
                }
                Err(e) if e.is::<AgentBailError>() => {
                    log::warn!("Virtual user {} bailed: {:?}", agent_id, e);
                    runner_context.checks().record_iteration(Some("bail"));
                    healthy = false;
                    break;
                }
                Err(e) => {
                    let class = classify_error(&e);
                    if class == "behaviour" {
                        log::error!(
                            "Agent behaviour failed for virtual user {}: {:?}",
                            agent_id,
                            e
                        );
                    } else {
                        log::warn!("Iteration failed for virtual user {}: {:#}", agent_id, e);
                    }
                    runner_context.checks().record_iteration(Some(class));
                }
            }

            context.next_iteration();

            if let Some(pacing) = options.pacing {
                runner_context.executor().pace(pacing, &cycle_listener);
            }
        }
    }

    if let Some(teardown_agent_fn) = hooks.teardown {
        if let Err(e) = teardown_agent_fn(&mut context) {
            log::error!("Agent teardown failed for virtual user {}: {:?}", agent_id, e);
        }
    }

    healthy
}

/// Group a failed iteration by the network error that caused it, if any.
fn classify_error(e: &anyhow::Error) -> &'static str {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<NetError>())
        .map(NetError::class)
        .unwrap_or("behaviour")
}

fn build_summary<RV: UserValuesConstraint>(
    name: &str,
    started_at: i64,
    options: &RunOptions,
    runner_context: &RunnerContext<RV>,
    virtual_user_end_count: usize,
) -> RunSummary {
    let mut summary = RunSummary::new(
        options.run_id.clone(),
        name.to_string(),
        started_at,
        options.duration.as_secs(),
        options.virtual_users,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.virtual_user_end_count = virtual_user_end_count;

    let checks = runner_context.checks();
    summary.checks = checks.summarize();
    summary.iterations = checks.iterations();
    summary.failed_iterations = checks.failed_iterations();

    let connections = runner_context.connections();
    summary.connections_opened = connections.opened();
    summary.connections_closed = connections.closed();

    if let Some(pacing) = options.pacing {
        summary.add_setting("pacing_ms", pacing.as_millis().to_string());
    }
    if let Some(iterations) = options.iterations {
        summary.add_setting("iterations", iterations.to_string());
    }
    if let Some(target) = &options.target {
        summary.add_setting("target", target.clone());
    }
    summary.add_setting("io_timeout_ms", options.io_timeout.as_millis().to_string());
    summary.add_setting("tls_min_version", options.tls.min_version.to_string());
    summary.add_setting("tls_max_version", options.tls.max_version.to_string());
    summary.add_setting(
        "tls_cipher_suites",
        match &options.tls.cipher_suites {
            CipherSuites::Any => "any".to_string(),
            CipherSuites::Only(names) => names.iter().cloned().collect::<Vec<_>>().join(","),
        },
    );
    summary.add_setting(
        "insecure_skip_tls_verify",
        options.tls.insecure_skip_verify.to_string(),
    );

    summary
}
