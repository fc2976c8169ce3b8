//! Parallel Monte Carlo estimation of π.
//!
//! Worker units draw batches of points in [-1, 1]² and post per-batch
//! counts to a single [`Aggregator`]. A [`RunController`] owns the run
//! lifecycle and a [`Reporter`] derives live statistics from the totals on
//! a fixed cadence.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod frames;
pub mod reporter;
pub mod sampler;
pub mod stats;
pub mod worker;

pub use aggregator::{Aggregator, IntervalSample, ResultSink, RunCounters, RunGate};
pub use config::{ForegroundMode, RunConfig};
pub use controller::{RunController, RunState, RunStatus, SourceFactory};
pub use error::{ConfigError, Error, Result};
pub use frames::{run_frames, Outcome};
pub use reporter::{Report, Reporter, Snapshot};
pub use sampler::{sample_batch, BatchSource, SampleBatchResult, Sampler};
pub use stats::{format_elapsed, DerivedStats, RunSummary};
pub use worker::{
    AliveGuard, Mailbox, ThreadSpawner, WorkerCommand, WorkerCore, WorkerHandle, WorkerId,
    WorkerSpawner, WorkerState, WorkerStatus,
};
