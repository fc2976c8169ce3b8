//! Command-line surface shared by the benchmark binaries.

use clap::{Args, ValueEnum};

use crate::config::{
    detected_parallelism, ForegroundMode, RunConfig, DEFAULT_BATCH_SIZE, DEFAULT_FOREGROUND_BATCH,
};
use crate::reporter::Snapshot;
use crate::stats::{format_elapsed, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ForegroundArg {
    Counted,
    DisplayOnly,
    Off,
}

impl From<ForegroundArg> for ForegroundMode {
    fn from(arg: ForegroundArg) -> Self {
        match arg {
            ForegroundArg::Counted => ForegroundMode::Counted,
            ForegroundArg::DisplayOnly => ForegroundMode::DisplayOnly,
            ForegroundArg::Off => ForegroundMode::Off,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Points sampled per worker batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Worker units to spawn (defaults to detected parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run length in seconds, 0 runs until interrupted
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Whether foreground frame batches count toward the estimate
    #[arg(long, value_enum, default_value_t = ForegroundArg::Counted)]
    pub foreground: ForegroundArg,

    /// Points sampled per foreground frame
    #[arg(long, default_value_t = DEFAULT_FOREGROUND_BATCH)]
    pub foreground_batch: u64,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,
}

impl RunArgs {
    pub fn to_config(&self) -> RunConfig {
        RunConfig::new(
            self.batch_size,
            self.workers.unwrap_or_else(detected_parallelism),
            self.duration,
        )
        .with_foreground(self.foreground.into(), self.foreground_batch)
    }
}

pub fn init_tracing(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_header(config: &RunConfig) {
    println!("Monte Carlo Pi Estimation");
    println!("Workers: {}", config.worker_count);
    println!("Batch size: {}", config.batch_size);
    match config.duration_seconds {
        0 => println!("Duration: unbounded (Ctrl-C to stop)"),
        secs => println!("Duration: {}s", secs),
    }
}

pub fn status_line(snapshot: &Snapshot) -> String {
    let estimate = match snapshot.stats {
        Some(stats) => format!(
            "pi {:.8} (err {:.2e}) acc {:.5}%",
            stats.pi_estimate,
            stats.signed_error(),
            stats.accuracy_percent
        ),
        None => "pi --".to_string(),
    };
    let rate = snapshot
        .throughput
        .map(|pps| format!("{:.0} pts/s", pps))
        .unwrap_or_else(|| "-- pts/s".to_string());

    format!(
        "{} | {} pts ({} inside) | {} | {} | {} threads",
        estimate,
        snapshot.total_points,
        snapshot.inside_points,
        rate,
        format_elapsed(snapshot.elapsed),
        snapshot.active_workers
    )
}

pub fn print_summary(summary: &RunSummary) {
    println!("Results");
    println!("Total points: {}", summary.total_points);
    println!("Points inside circle: {}", summary.inside_points);
    if let Some(stats) = summary.stats {
        println!("Pi estimate: {:.8}", stats.pi_estimate);
        println!("Error: {:.8}", stats.absolute_error);
        println!("Accuracy: {:.5}%", stats.accuracy_percent);
    }
    if let Some(pps) = summary.throughput {
        println!("Points per second: {:.0}", pps);
    }
    println!("Time: {:.2}s", summary.elapsed.as_secs_f64());
    println!("Threads: {}", summary.workers_used);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::RunStatus;
    use crate::stats::DerivedStats;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn parses_flags_into_config() {
        let cli = TestCli::parse_from([
            "pi_bench",
            "--batch-size",
            "500",
            "--workers",
            "3",
            "--duration",
            "7",
            "--foreground",
            "display-only",
        ]);
        let config = cli.run.to_config();
        assert_eq!(config, RunConfig::new(500, 3, 7).with_foreground(ForegroundMode::DisplayOnly, 5000));
        assert_eq!(cli.run.log_level, tracing::Level::WARN);
    }

    #[test]
    fn negative_values_are_rejected_by_the_parser() {
        assert!(TestCli::try_parse_from(["pi_bench", "--workers", "-1"]).is_err());
        assert!(TestCli::try_parse_from(["pi_bench", "--duration", "-5"]).is_err());
    }

    #[test]
    fn status_line_without_points() {
        let snapshot = Snapshot {
            status: RunStatus::Running,
            total_points: 0,
            inside_points: 0,
            stats: None,
            elapsed: Duration::from_secs(3),
            throughput: None,
            frame_rate: None,
            active_workers: 2,
        };
        let line = status_line(&snapshot);
        assert!(line.starts_with("pi --"));
        assert!(line.contains("00:00:03"));
        assert!(line.ends_with("2 threads"));

        let snapshot = Snapshot {
            total_points: 4000,
            inside_points: 3140,
            stats: DerivedStats::from_counts(3140, 4000),
            ..snapshot
        };
        assert!(status_line(&snapshot).starts_with("pi 3.14000000"));
    }
}
