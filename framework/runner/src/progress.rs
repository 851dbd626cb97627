use std::cmp::min;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gale_core::prelude::DelegatedShutdownListener;
use gale_instruments::CheckRecorder;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Displays a progress bar while the run is going to show the user how long is left and how many
/// iterations have completed.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    checks: Arc<CheckRecorder>,
    shutdown_listener: DelegatedShutdownListener,
) {
    let hours = planned_runtime.as_secs() / 3600;
    let minutes = (planned_runtime.as_secs() % 3600) / 60;
    let seconds = planned_runtime.as_secs() % 60;

    let style = match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
    ) {
        Ok(style) => style
            .with_key(
                "planned_runtime",
                move |_state: &ProgressState, w: &mut dyn Write| {
                    let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
                },
            )
            .progress_chars("#>-"),
        Err(e) => {
            log::warn!("Not showing progress, invalid progress style: {e:?}");
            return;
        }
    };

    let spawned = std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                pb.set_message(format!("{} iterations", checks.iterations()));
                std::thread::sleep(Duration::from_millis(250));
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start progress thread: {e:?}");
    }
}
