use std::future::Future;
use std::time::Duration;

use gale_core::prelude::DelegatedShutdownListener;

/// Runs async work for the virtual user threads on a shared Tokio runtime.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime) -> Self {
        Self { runtime }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is not cancelled when the run starts draining. An iteration that is in flight
    /// when the deadline passes is allowed to finish, so futures submitted here should bound their
    /// own I/O. The network client does this with the run's I/O timeout.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(fut)
    }

    /// Submit async code to be run in the background.
    ///
    /// It is not guaranteed that the runner will wait for the future to complete before shutting
    /// down. In behaviour hooks, use [Executor::execute_in_place] so that the work finishes before
    /// the iteration does.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Sleep for `delay` or until the shutdown signal arrives, whichever is first.
    pub(crate) fn pace(&self, delay: Duration, listener: &DelegatedShutdownListener) {
        let mut listener = listener.clone();
        self.runtime.block_on(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = listener.wait_for_shutdown() => {},
            }
        });
    }
}
