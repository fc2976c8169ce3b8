use std::sync::Arc;
use std::time::Instant;

use crate::aggregator::{spawn_collector, Aggregator, ResultSink, RunCounters, RunGate};
use crate::config::{validate_batch_size, ForegroundMode, RunConfig};
use crate::error::Result;
use crate::sampler::{BatchSource, SampleBatchResult, Sampler};
use crate::stats::RunSummary;
use crate::worker::{ThreadSpawner, WorkerHandle, WorkerId, WorkerSpawner};

/// Builds the batch source for each spawned unit.
pub type SourceFactory = Arc<dyn Fn(WorkerId) -> Box<dyn BatchSource> + Send + Sync>;

type CollectorFn = fn(Arc<Aggregator>, Arc<RunGate>) -> Result<ResultSink>;

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Stopped,
    Running,
    Finished(RunSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Stopped,
    Running,
    Finished,
}

impl RunState {
    pub fn status(&self) -> RunStatus {
        match self {
            RunState::Stopped => RunStatus::Stopped,
            RunState::Running => RunStatus::Running,
            RunState::Finished(_) => RunStatus::Finished,
        }
    }
}

struct ActiveRun {
    gate: Arc<RunGate>,
    sink: ResultSink,
}

pub struct RunController {
    aggregator: Arc<Aggregator>,
    spawner: Box<dyn WorkerSpawner>,
    sources: SourceFactory,
    collector: CollectorFn,
    config: RunConfig,
    state: RunState,
    workers: Vec<WorkerHandle>,
    run: Option<ActiveRun>,
    foreground: Sampler,
}

impl RunController {
    pub fn new(spawner: Box<dyn WorkerSpawner>) -> Self {
        RunController::with_sources(
            spawner,
            Arc::new(|_: WorkerId| Box::new(Sampler::from_entropy()) as Box<dyn BatchSource>),
        )
    }

    pub fn with_sources(spawner: Box<dyn WorkerSpawner>, sources: SourceFactory) -> Self {
        RunController {
            aggregator: Arc::new(Aggregator::new()),
            spawner,
            sources,
            collector: spawn_collector,
            config: RunConfig::default(),
            state: RunState::Stopped,
            workers: Vec::new(),
            run: None,
            foreground: Sampler::from_entropy(),
        }
    }

    /// Controller backed by one OS thread per worker unit.
    pub fn threaded() -> Self {
        RunController::new(Box::new(ThreadSpawner))
    }

    pub fn start(&mut self, config: RunConfig) -> Result<()> {
        if self.is_running() {
            tracing::debug!("start ignored, run already in progress");
            return Ok(());
        }
        config.validate()?;

        let gate = RunGate::open();
        let sink = (self.collector)(self.aggregator.clone(), gate.clone())?;

        // a finished run is over; starting again begins from zero
        if matches!(self.state, RunState::Finished(_)) {
            self.aggregator.reset();
        }
        let fresh = self.aggregator.begin_run(Instant::now());

        for id in 0..config.worker_count {
            let source = (self.sources)(id);
            match self.spawner.spawn(id, source, sink.clone()) {
                Ok(handle) => {
                    handle.start(config.batch_size);
                    self.workers.push(handle);
                }
                Err(error) => {
                    tracing::warn!(worker = id, %error, "failed to spawn worker unit");
                }
            }
        }

        tracing::info!(
            fresh,
            workers = self.workers.len(),
            batch_size = config.batch_size,
            duration_seconds = config.duration_seconds,
            "run started"
        );

        self.config = config;
        self.run = Some(ActiveRun { gate, sink });
        self.state = RunState::Running;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.halt();
        if self.is_running() {
            self.state = RunState::Stopped;
            tracing::info!(total_points = self.counters().total_points, "run stopped");
        }
    }

    pub fn reset(&mut self) {
        self.halt();
        self.aggregator.reset();
        self.state = RunState::Stopped;
        tracing::info!("run reset");
    }

    pub fn update_batch_size(&mut self, batch_size: u64) -> Result<()> {
        validate_batch_size(batch_size)?;
        self.config.batch_size = batch_size;
        if self.is_running() {
            for worker in &self.workers {
                worker.update_batch(batch_size);
            }
        }
        tracing::info!(batch_size, "batch size updated");
        Ok(())
    }

    /// Finishes the run once its configured duration has elapsed.
    pub fn check_duration(&mut self, now: Instant) -> Option<RunSummary> {
        if !self.is_running() {
            return None;
        }
        let limit = self.config.duration()?;
        if self.counters().elapsed(now) < limit {
            return None;
        }
        Some(self.finish(now))
    }

    /// Draws one foreground batch on the caller's context. Counted batches
    /// go through the same merge path as the worker units.
    pub fn sample_foreground(&mut self) -> Option<SampleBatchResult> {
        if !self.is_running() || self.config.foreground == ForegroundMode::Off {
            return None;
        }
        let result = self.foreground.sample(self.config.foreground_batch);
        if self.config.foreground == ForegroundMode::Counted {
            if let Some(run) = &self.run {
                run.sink.post(result);
            }
        }
        Some(result)
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn counters(&self) -> RunCounters {
        self.aggregator.snapshot()
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Units whose execution context is still alive.
    pub fn active_worker_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    fn finish(&mut self, now: Instant) -> RunSummary {
        let workers_used = match self.workers.len() {
            0 => self.config.worker_count,
            n => n,
        };
        self.halt();

        let counters = self.counters();
        let summary = RunSummary::new(
            counters.total_points,
            counters.inside_points,
            counters.elapsed(now),
            workers_used,
        );
        tracing::info!(
            total_points = summary.total_points,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            workers = workers_used,
            "run finished"
        );
        self.state = RunState::Finished(summary.clone());
        summary
    }

    // Closing the gate first guarantees nothing merges once this returns.
    // Each unit sees its stop flag before its next batch; a batch already
    // in flight runs out and its result is dropped at the gate.
    fn halt(&mut self) {
        if let Some(run) = self.run.take() {
            run.gate.close();
        }
        for worker in self.workers.drain(..) {
            worker.stop();
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.halt();
    }
}
