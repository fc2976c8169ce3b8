use std::time::{Duration, Instant};

use crate::config::{STATUS_INTERVAL, THROUGHPUT_INTERVAL};
use crate::controller::{RunController, RunState, RunStatus};
use crate::stats::{self, DerivedStats, RunSummary};

/// Everything a front end needs to draw the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub status: RunStatus,
    pub total_points: u64,
    pub inside_points: u64,
    pub stats: Option<DerivedStats>,
    pub elapsed: Duration,
    pub throughput: Option<f64>,
    pub frame_rate: Option<f64>,
    pub active_workers: usize,
}

impl Snapshot {
    pub fn pi_estimate(&self) -> Option<f64> {
        self.stats.map(|s| s.pi_estimate)
    }

    pub fn error(&self) -> Option<f64> {
        self.stats.map(|s| s.absolute_error)
    }

    pub fn accuracy_percent(&self) -> Option<f64> {
        self.stats.map(|s| s.accuracy_percent)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub snapshot: Snapshot,
    /// Set on the tick that ended the run.
    pub finished: Option<RunSummary>,
}

/// Derives live statistics on a fixed cadence. Holds no counters of its own.
#[derive(Debug, Clone)]
pub struct Reporter {
    status_interval: Duration,
    throughput_interval: Duration,
    last_status: Option<Instant>,
    last_tick: Option<Instant>,
    run_started_at: Option<Instant>,
    throughput: Option<f64>,
    frame_rate: Option<f64>,
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter::with_intervals(STATUS_INTERVAL, THROUGHPUT_INTERVAL)
    }
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    pub fn with_intervals(status_interval: Duration, throughput_interval: Duration) -> Self {
        Reporter {
            status_interval,
            throughput_interval,
            last_status: None,
            last_tick: None,
            run_started_at: None,
            throughput: None,
            frame_rate: None,
        }
    }

    pub fn status_interval(&self) -> Duration {
        self.status_interval
    }

    /// May be called as often as the host likes. Produces a report only when
    /// the status interval has passed; that report also carries the final
    /// summary if the run hit its duration.
    pub fn tick(&mut self, controller: &mut RunController, now: Instant) -> Option<Report> {
        if let Some(prev) = self.last_tick.replace(now) {
            let dt = now.saturating_duration_since(prev).as_secs_f64();
            if dt > 0.0 {
                self.frame_rate = Some(dt.recip());
            }
        }

        if !controller.is_running() {
            return None;
        }
        self.sample_throughput(controller, now);

        if let Some(last) = self.last_status {
            if now.saturating_duration_since(last) < self.status_interval {
                return None;
            }
        }
        self.last_status = Some(now);

        let finished = controller.check_duration(now);
        Some(Report {
            snapshot: self.snapshot(controller, now),
            finished,
        })
    }

    pub fn snapshot(&self, controller: &RunController, now: Instant) -> Snapshot {
        let counters = controller.counters();
        let elapsed = match controller.state() {
            RunState::Finished(summary) => summary.elapsed,
            _ => counters.elapsed(now),
        };
        let throughput = match counters.started_at {
            Some(_) if counters.started_at == self.run_started_at => self.throughput,
            _ => None,
        };

        Snapshot {
            status: controller.state().status(),
            total_points: counters.total_points,
            inside_points: counters.inside_points,
            stats: DerivedStats::from_counts(counters.inside_points, counters.total_points),
            elapsed,
            throughput,
            frame_rate: self.frame_rate,
            active_workers: controller.active_worker_count(),
        }
    }

    // Divides by the real window length so a late tick still reads right.
    fn sample_throughput(&mut self, controller: &RunController, now: Instant) {
        let counters = controller.counters();
        if counters.started_at != self.run_started_at {
            self.run_started_at = counters.started_at;
            self.throughput = None;
        }

        let Some(since) = counters.interval_started_at else {
            return;
        };
        if now.saturating_duration_since(since) < self.throughput_interval {
            return;
        }
        if let Some(sample) = controller.aggregator().take_interval(now) {
            self.throughput = stats::throughput(sample.points, sample.elapsed);
        }
    }
}
