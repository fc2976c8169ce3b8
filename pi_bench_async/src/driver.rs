use std::future::Future;
use std::time::{Duration, Instant};

use pi_bench::{Outcome, Report, Reporter, RunController};
use tokio::time::{self, MissedTickBehavior};

/// Paces the foreground context one frame at a time, feeding the reporter
/// until the run finishes or `shutdown` resolves.
pub async fn drive<F>(
    controller: &mut RunController,
    reporter: &mut Reporter,
    frame: Duration,
    shutdown: F,
    mut on_report: impl FnMut(&Report),
) -> Outcome
where
    F: Future<Output = ()>,
{
    let mut frames = time::interval(frame);
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                controller.stop();
                tracing::info!("run interrupted");
                return Outcome::Interrupted(reporter.snapshot(controller, Instant::now()));
            }
            _ = frames.tick() => {
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
            }
        }
    }
}
