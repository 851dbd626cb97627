use gale_core::prelude::ShutdownHandle;
use tokio::signal;

/// Treat Ctrl-C as an external request to stop the run. Virtual users finish the iteration they
/// are in and then stop.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, draining virtual users...");
                listener_handle.shutdown();
            }
            Err(e) => log::warn!("Unable to listen for Ctrl-C: {e:?}"),
        }
    });

    handle
}
