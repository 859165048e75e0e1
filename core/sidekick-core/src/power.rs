//! Suspend/resume detection.
//!
//! There is no portable OS power-notification API, so the monitor samples
//! the wall clock at a fixed tick and treats a gap far larger than the tick
//! as a suspend/resume cycle. The callback forwards to the tracker's resume
//! transition.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// A tick that overshoots its interval by more than `gap` means the host
/// was suspended in between.
fn gap_detected(elapsed: Duration, tick: Duration, gap: Duration) -> bool {
    elapsed > tick + gap
}

pub struct ResumeMonitor {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ResumeMonitor {
    /// Starts the monitor thread. `on_resume` is invoked once per detected
    /// suspend/resume cycle.
    pub fn start<F>(tick: Duration, gap: Duration, on_resume: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let worker = thread::Builder::new()
            .name("resume-monitor".to_string())
            .spawn(move || {
                // Wall clock, not a monotonic one: monotonic clocks stop
                // during suspend on most platforms, which would hide exactly
                // the gap this thread exists to observe.
                let mut last_tick = Utc::now();
                loop {
                    thread::sleep(tick);
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let now = Utc::now();
                    let elapsed = (now - last_tick).to_std().unwrap_or_default();
                    last_tick = now;
                    if gap_detected(elapsed, tick, gap) {
                        info!(
                            gap_secs = elapsed.as_secs(),
                            at = %now.to_rfc3339(),
                            "Wall-clock gap detected, treating as system resume"
                        );
                        on_resume();
                    }
                }
            });

        match worker {
            Ok(worker) => Self {
                stop,
                worker: Some(worker),
            },
            Err(err) => {
                warn!(error = %err, "Failed to start resume monitor");
                Self { stop, worker: None }
            }
        }
    }

    /// Stops the monitor and waits for the worker to exit.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ResumeMonitor {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
