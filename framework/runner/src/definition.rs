use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gale_core::prelude::TlsPolicy;

use crate::cli::GaleScenarioCli;
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::options::{resolve_options, ConfigError, RunOptions, ScenarioDefaults};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// The builder for a scenario definition.
///
/// This must be used at the start of a scenario to define what each virtual user does and how the
/// run is configured by default.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: GaleScenarioCli,
    /// Defaults that the scenario sets in code. The command line takes precedence.
    defaults: ScenarioDefaults,
    /// Global setup hook for this scenario. It will be run once, before any virtual users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, which will be run once by each virtual user before its first
    /// iteration.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The behaviour run once per iteration by every virtual user.
    agent_behaviour: Option<AgentHookMut<RV, V>>,
    /// Teardown hook for a virtual user, run once after its last iteration.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook for this scenario. It will be run once, after all virtual users have
    /// stopped. This is a best effort hook and errors are logged rather than failing the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub name: String,
    pub options: RunOptions,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub agent_behaviour: Option<AgentHookMut<RV, V>>,
    pub teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise logging and parse the command line, then create a new scenario definition.
    ///
    /// This is the normal entry point for a scenario binary. See [ScenarioDefinitionBuilder::new]
    /// to supply the command line yourself, for example in tests.
    pub fn new_with_init(name: &str) -> Self {
        env_logger::init();

        Self::new(name, GaleScenarioCli::parse())
    }

    /// Create a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: GaleScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            defaults: ScenarioDefaults::default(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: None,
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Set the target to use if none is given with `--target`.
    pub fn with_default_target(mut self, target: &str) -> Self {
        self.defaults.target = Some(target.to_string());
        self
    }

    /// Set the duration to run for if none is given on the command line.
    pub fn with_default_duration_s(mut self, duration: u64) -> Self {
        self.defaults.duration_s = Some(duration);
        self
    }

    /// Set the delay between iterations of each virtual user if none is given on the command line.
    pub fn with_default_pacing(mut self, pacing: Duration) -> Self {
        self.defaults.pacing = Some(pacing);
        self
    }

    /// Set the TLS policy for the scenario. Individual fields can still be overridden from the
    /// command line.
    pub fn with_default_tls_policy(mut self, tls: TlsPolicy) -> Self {
        self.defaults.tls = tls;
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the virtual user setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_agent_behaviour(mut self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.agent_behaviour = Some(behaviour);
        self
    }

    /// Set the virtual user teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> Result<ScenarioDefinition<RV, V>, ConfigError> {
        let options = resolve_options(&self.cli, &self.defaults)?;

        Ok(ScenarioDefinition {
            name: self.name,
            options,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour: self.agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}
