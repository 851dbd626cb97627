use std::sync::Arc;

use tokio::sync::watch;

/// Broadcasts the end of a run to every virtual user and background task.
///
/// The signal is level-triggered: once [ShutdownHandle::shutdown] has been called, every
/// listener created before or after that point observes it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::channel(false).0),
        }
    }

    pub fn shutdown(&self) {
        if !self.sender.send_replace(true) {
            log::debug!("Shutdown signal sent");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been sent. If this returns true then no new
    /// work should be started so that the run can drain.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. It is safe to race this with another future so that the
    /// shutdown signal can cut short a wait, such as the pacing delay between iterations.
    pub async fn wait_for_shutdown(&mut self) {
        // A dropped sender can never signal again, which is treated the same as a shutdown.
        let _ = self.receiver.wait_for(|shutdown| *shutdown).await;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_created_after_shutdown_sees_it() {
        let handle = ShutdownHandle::new();
        let early = handle.new_listener();
        assert!(!early.should_shutdown());

        handle.shutdown();
        let late = handle.new_listener();

        assert!(early.should_shutdown());
        assert!(late.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn repeated_checks_keep_reporting_shutdown() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        handle.shutdown();
        handle.shutdown();

        assert!(listener.should_shutdown());
        assert!(listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_once_signalled() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move {
            listener.wait_for_shutdown().await;
        });

        handle.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("listener did not observe shutdown")
            .unwrap();
    }
}
