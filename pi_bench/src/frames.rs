use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::controller::RunController;
use crate::reporter::{Report, Reporter, Snapshot};
use crate::stats::RunSummary;

/// How a frame loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The run reached its configured duration.
    Finished(RunSummary),
    /// Shutdown was requested; the run was stopped.
    Interrupted(Snapshot),
    /// The controller was not running.
    Stopped(Snapshot),
}

impl Outcome {
    /// Summary for the printout. Runs that did not finish on their own are
    /// summarized from their last snapshot.
    pub fn into_summary(self, workers_used: usize) -> RunSummary {
        match self {
            Outcome::Finished(summary) => summary,
            Outcome::Interrupted(snapshot) | Outcome::Stopped(snapshot) => RunSummary::new(
                snapshot.total_points,
                snapshot.inside_points,
                snapshot.elapsed,
                workers_used,
            ),
        }
    }
}

/// Runs the foreground frame loop on the calling thread until the run
/// finishes or `shutdown` is raised.
pub fn run_frames(
    controller: &mut RunController,
    reporter: &mut Reporter,
    frame: Duration,
    shutdown: &AtomicBool,
    mut on_report: impl FnMut(&Report),
) -> Outcome {
    loop {
        let frame_started = Instant::now();
        if shutdown.load(Ordering::Acquire) {
            controller.stop();
            tracing::info!("run interrupted");
            return Outcome::Interrupted(reporter.snapshot(controller, Instant::now()));
        }

        controller.sample_foreground();
        if let Some(report) = reporter.tick(controller, Instant::now()) {
            on_report(&report);
            if let Some(summary) = report.finished {
                return Outcome::Finished(summary);
            }
        }
        if !controller.is_running() {
            return Outcome::Stopped(reporter.snapshot(controller, Instant::now()));
        }

        thread::sleep(frame.saturating_sub(frame_started.elapsed()));
    }
}
