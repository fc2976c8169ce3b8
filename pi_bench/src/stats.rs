use std::f64::consts::PI;
use std::time::Duration;

/// Figures derived from a pair of counters. Recomputed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedStats {
    pub pi_estimate: f64,
    pub absolute_error: f64,
    pub accuracy_percent: f64,
}

impl DerivedStats {
    /// `None` until at least one point has been sampled.
    pub fn from_counts(inside_points: u64, total_points: u64) -> Option<Self> {
        if total_points == 0 {
            return None;
        }
        let pi_estimate = 4.0 * inside_points as f64 / total_points as f64;
        let absolute_error = (pi_estimate - PI).abs();
        let accuracy_percent = (100.0 - 100.0 * absolute_error / PI).max(0.0);

        Some(DerivedStats {
            pi_estimate,
            absolute_error,
            accuracy_percent,
        })
    }

    /// Signed deviation from the true value.
    pub fn signed_error(&self) -> f64 {
        self.pi_estimate - PI
    }
}

/// Points per second over `elapsed`; `None` for an empty window.
pub fn throughput(points: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| points as f64 / secs)
}

/// Final figures of a run that reached its configured duration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_points: u64,
    pub inside_points: u64,
    pub stats: Option<DerivedStats>,
    pub elapsed: Duration,
    pub throughput: Option<f64>,
    pub workers_used: usize,
}

impl RunSummary {
    pub fn new(total_points: u64, inside_points: u64, elapsed: Duration, workers_used: usize) -> Self {
        RunSummary {
            total_points,
            inside_points,
            stats: DerivedStats::from_counts(inside_points, total_points),
            elapsed,
            throughput: throughput(total_points, elapsed),
            workers_used,
        }
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let s = elapsed.as_secs();
    let (h, m) = (s / 3600, s / 60 % 60);
    format!("{:02}:{:02}:{:02}", h, m, s % 60)
}
