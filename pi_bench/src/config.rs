use std::thread;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BATCH_SIZE: u64 = 10_000;
pub const DEFAULT_FOREGROUND_BATCH: u64 = 5_000;
pub const FALLBACK_WORKERS: usize = 4;

/// Status refresh cadence.
pub const STATUS_INTERVAL: Duration = Duration::from_millis(100);
/// Throughput sampling cadence.
pub const THROUGHPUT_INTERVAL: Duration = Duration::from_millis(1000);
/// Foreground frame pacing, roughly 60 frames per second.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// How points drawn on the foreground context are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForegroundMode {
    /// Foreground points count toward the official totals.
    #[default]
    Counted,
    /// Foreground points are drawn for display and never merged.
    DisplayOnly,
    /// No foreground sampling at all.
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub batch_size: u64,
    pub worker_count: usize,
    /// Zero means the run is unbounded.
    pub duration_seconds: u64,
    pub foreground: ForegroundMode,
    pub foreground_batch: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: detected_parallelism(),
            duration_seconds: 0,
            foreground: ForegroundMode::default(),
            foreground_batch: DEFAULT_FOREGROUND_BATCH,
        }
    }
}

impl RunConfig {
    pub fn new(batch_size: u64, worker_count: usize, duration_seconds: u64) -> Self {
        RunConfig {
            batch_size,
            worker_count,
            duration_seconds,
            ..RunConfig::default()
        }
    }

    pub fn with_foreground(mut self, mode: ForegroundMode, batch: u64) -> Self {
        self.foreground = mode;
        self.foreground_batch = batch;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_batch_size(self.batch_size)?;
        if self.foreground != ForegroundMode::Off && self.foreground_batch == 0 {
            return Err(ConfigError::ForegroundBatch);
        }
        Ok(())
    }

    /// `None` for unbounded runs.
    pub fn duration(&self) -> Option<Duration> {
        match self.duration_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub fn validate_batch_size(batch_size: u64) -> Result<(), ConfigError> {
    if batch_size == 0 {
        return Err(ConfigError::BatchSize(batch_size));
    }
    Ok(())
}

pub fn detected_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}
