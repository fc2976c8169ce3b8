use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::sampler::SampleBatchResult;

/// Read-only copy of the aggregator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    pub total_points: u64,
    pub inside_points: u64,
    pub started_at: Option<Instant>,
    pub points_since_last_interval_check: u64,
    pub interval_started_at: Option<Instant>,
}

impl RunCounters {
    pub fn is_fresh(&self) -> bool {
        self.total_points == 0 && self.started_at.is_none()
    }

    /// Wall-clock time since the run first started, paused gaps included.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }
}

/// Points counted over one throughput window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSample {
    pub points: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Clock {
    started_at: Option<Instant>,
    interval_started_at: Option<Instant>,
}

/// Owner of the running totals. Every producer funnels through `merge`.
#[derive(Debug, Default)]
pub struct Aggregator {
    total_points: AtomicU64,
    inside_points: AtomicU64,
    interval_points: AtomicU64,
    clock: Mutex<Clock>,
}

impl Aggregator {
    pub fn new() -> Self {
        Aggregator::default()
    }

    // Total is bumped before inside, and snapshots load inside first, so a
    // snapshot never observes inside > total.
    pub fn merge(&self, result: SampleBatchResult) {
        self.total_points
            .fetch_add(result.total_count, Ordering::Relaxed);
        self.interval_points
            .fetch_add(result.total_count, Ordering::Relaxed);
        self.inside_points
            .fetch_add(result.inside_count, Ordering::Release);
    }

    pub fn snapshot(&self) -> RunCounters {
        // the clock lock serializes against reset, never against merge
        let clock = self.clock();
        let inside_points = self.inside_points.load(Ordering::Acquire);
        let total_points = self.total_points.load(Ordering::Relaxed);
        let points_since_last_interval_check = self.interval_points.load(Ordering::Relaxed);

        RunCounters {
            total_points,
            inside_points,
            started_at: clock.started_at,
            points_since_last_interval_check,
            interval_started_at: clock.interval_started_at,
        }
    }

    /// Stamps the start time on a fresh run and opens a new throughput
    /// window either way. Returns whether the run was fresh.
    pub fn begin_run(&self, now: Instant) -> bool {
        let mut clock = self.clock();
        let fresh = clock.started_at.is_none() && self.total_points.load(Ordering::Relaxed) == 0;
        if clock.started_at.is_none() {
            clock.started_at = Some(now);
        }
        self.interval_points.store(0, Ordering::Relaxed);
        clock.interval_started_at = Some(now);
        fresh
    }

    /// Closes the current throughput window and opens the next one.
    pub fn take_interval(&self, now: Instant) -> Option<IntervalSample> {
        let mut clock = self.clock();
        let since = clock.interval_started_at?;
        let points = self.interval_points.swap(0, Ordering::Relaxed);
        clock.interval_started_at = Some(now);
        Some(IntervalSample {
            points,
            elapsed: now.saturating_duration_since(since),
        })
    }

    /// Zeroes every counter under the clock lock, so a concurrent snapshot
    /// sees either the old totals or the cleared ones. Must not race
    /// `merge`: close the run's gate first.
    pub fn reset(&self) {
        let mut clock = self.clock();
        self.inside_points.store(0, Ordering::Relaxed);
        self.interval_points.store(0, Ordering::Relaxed);
        self.total_points.store(0, Ordering::Relaxed);
        *clock = Clock::default();
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission switch for one run. Once closed, results posted by that run's
/// producers are dropped instead of merged.
#[derive(Debug)]
pub struct RunGate {
    open: RwLock<bool>,
}

impl RunGate {
    pub fn open() -> Arc<Self> {
        Arc::new(RunGate {
            open: RwLock::new(true),
        })
    }

    /// Blocks until any merge in progress has landed.
    pub fn close(&self) {
        *self.open.write().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit(&self, aggregator: &Aggregator, result: SampleBatchResult) -> bool {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if *open {
            aggregator.merge(result);
        }
        *open
    }
}

/// Post-and-forget handle producers use to deliver batch results.
#[derive(Debug, Clone)]
pub struct ResultSink {
    tx: Sender<SampleBatchResult>,
}

impl ResultSink {
    pub fn channel() -> (ResultSink, Receiver<SampleBatchResult>) {
        let (tx, rx) = mpsc::channel();
        (ResultSink { tx }, rx)
    }

    /// Returns false once the receiving side is gone.
    pub fn post(&self, result: SampleBatchResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Starts the inbox thread that merges posted results through `gate`.
/// The thread exits when every clone of the returned sink is dropped.
pub fn spawn_collector(aggregator: Arc<Aggregator>, gate: Arc<RunGate>) -> Result<ResultSink> {
    let (sink, inbox) = ResultSink::channel();

    thread::Builder::new()
        .name("pi-collector".into())
        .spawn(move || {
            let mut dropped = 0u64;
            for result in inbox {
                if !gate.admit(&aggregator, result) {
                    dropped += 1;
                }
            }
            tracing::debug!(dropped, "collector drained");
        })
        .map_err(|source| Error::Spawn {
            what: "collector",
            source,
        })?;

    Ok(sink)
}
