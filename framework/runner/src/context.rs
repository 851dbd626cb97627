use std::{fmt::Debug, sync::Arc};

use gale_core::prelude::{ConnectionTracker, DelegatedShutdownListener, ShutdownHandle};
use gale_instruments::{CheckContext, CheckRecorder, Reporter};
use parking_lot::RwLock;

use crate::executor::Executor;
use crate::options::RunOptions;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Configured, setup hook not yet finished.
    Idle,
    /// Virtual users are being spawned and the deadline timer is running.
    Starting,
    /// All virtual users are running iterations.
    Running,
    /// The deadline passed or a stop was requested. In-flight iterations finish, no new ones start.
    Draining,
    /// Every virtual user has stopped.
    Done,
}

/// Shared phase cell. Kept separate from [RunnerContext] so that background tasks on the runtime
/// can update it without holding the context (and with it the runtime) alive.
#[derive(Debug, Clone)]
pub(crate) struct PhaseCell(Arc<RwLock<RunPhase>>);

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(RwLock::new(RunPhase::Idle)))
    }

    pub(crate) fn get(&self) -> RunPhase {
        *self.0.read()
    }

    pub(crate) fn set(&self, phase: RunPhase) {
        let mut current = self.0.write();
        if *current != phase {
            log::info!("Run phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }

    /// Move to `to` only if the run is still in `from`.
    pub(crate) fn advance(&self, from: RunPhase, to: RunPhase) {
        let mut current = self.0.write();
        if *current == from {
            log::info!("Run phase {:?} -> {:?}", from, to);
            *current = to;
        }
    }

    /// Start draining unless the run has not started or is already past that point.
    pub(crate) fn drain(&self) {
        let mut current = self.0.write();
        if matches!(*current, RunPhase::Starting | RunPhase::Running) {
            log::info!("Run phase {:?} -> {:?}", *current, RunPhase::Draining);
            *current = RunPhase::Draining;
        }
    }
}

#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    checks: Arc<CheckRecorder>,
    connections: Arc<ConnectionTracker>,
    shutdown_handle: ShutdownHandle,
    options: RunOptions,
    phase: PhaseCell,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        options: RunOptions,
        phase: PhaseCell,
    ) -> Self {
        Self {
            executor,
            reporter,
            checks: Arc::new(CheckRecorder::new()),
            connections: Arc::new(ConnectionTracker::new()),
            shutdown_handle,
            options,
            phase,
            value: Default::default(),
        }
    }

    /// A handle to the executor for running async code from hooks.
    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// The reporter that network operations are recorded to.
    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The shared check log for this run.
    pub fn checks(&self) -> &Arc<CheckRecorder> {
        &self.checks
    }

    /// Counts every connection opened and closed by the virtual users.
    pub fn connections(&self) -> Arc<ConnectionTracker> {
        self.connections.clone()
    }

    /// The options this run was started with.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// The connection string passed with `--target`, if any.
    pub fn get_connection_string(&self) -> Option<&str> {
        self.options.target.as_deref()
    }

    pub fn get_run_id(&self) -> &str {
        &self.options.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.get()
    }

    /// Ask every virtual user to stop after its current iteration.
    pub fn force_stop_scenario(&self) {
        log::info!("Stop requested for run {}", self.options.run_id);
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_id: String,
    virtual_user_id: usize,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        virtual_user_id: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_id: format!("vu-{virtual_user_id}"),
            virtual_user_id,
            iteration: 0,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// A display name for this virtual user, also used as its thread name.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn virtual_user_id(&self) -> usize {
        self.virtual_user_id
    }

    /// Zero-based index of the iteration currently running for this virtual user.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// For behaviours that wait on something and want to give up early once the run is stopping.
    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// Record a single named check for the current iteration.
    pub fn record_check(&self, name: &str, passed: bool) {
        self.runner_context.checks().record(
            name,
            passed,
            CheckContext {
                virtual_user_id: self.virtual_user_id,
                iteration: self.iteration,
            },
        );
    }

    /// Evaluate a named predicate against `value` and record the outcome for the current
    /// iteration. Returns whether the check passed.
    ///
    /// ```rust,no_run
    /// # use gale_runner::prelude::*;
    /// # #[derive(Debug, Default)] struct Rv;
    /// # impl UserValuesConstraint for Rv {}
    /// # fn behaviour(ctx: &mut AgentContext<Rv, Rv>) -> HookResult {
    /// let reply = "Hello, you said: Say Hello".to_string();
    /// ctx.check(&reply, "verify ag tag", |r| r.contains("Hello"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn check<T: ?Sized>(
        &self,
        value: &T,
        name: &str,
        predicate: impl FnOnce(&T) -> bool,
    ) -> bool {
        let passed = predicate(value);
        self.record_check(name, passed);
        passed
    }

    /// Evaluate several named predicates against the same value. Every predicate is evaluated
    /// and recorded, even after one fails. Returns true if all of them passed.
    pub fn check_all<T: ?Sized>(
        &self,
        value: &T,
        checks: &[(&str, &dyn Fn(&T) -> bool)],
    ) -> bool {
        checks.iter().fold(true, |all_passed, (name, predicate)| {
            let passed = predicate(value);
            self.record_check(name, passed);
            all_passed && passed
        })
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
