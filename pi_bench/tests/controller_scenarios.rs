use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use pi_bench::{
    BatchSource, ForegroundMode, Reporter, RunConfig, RunController, RunState, RunStatus,
    SampleBatchResult, Sampler, ThreadSpawner, WorkerId,
};

/// Plays back a fixed list of results, then idles on empty batches.
struct ScriptedSource {
    script: VecDeque<SampleBatchResult>,
}

impl ScriptedSource {
    fn once(inside: u64, total: u64) -> Self {
        ScriptedSource {
            script: VecDeque::from([SampleBatchResult::new(inside, total).unwrap()]),
        }
    }

    fn empty() -> Self {
        ScriptedSource {
            script: VecDeque::new(),
        }
    }
}

impl BatchSource for ScriptedSource {
    fn sample(&mut self, _batch_size: u64) -> SampleBatchResult {
        match self.script.pop_front() {
            Some(result) => result,
            None => {
                thread::sleep(Duration::from_millis(1));
                SampleBatchResult::EMPTY
            }
        }
    }
}

struct HeldSource {
    started: Sender<()>,
    release: Receiver<()>,
}

impl BatchSource for HeldSource {
    fn sample(&mut self, batch_size: u64) -> SampleBatchResult {
        let _ = self.started.send(());
        let _ = self.release.recv();
        SampleBatchResult::new(batch_size, batch_size).unwrap()
    }
}

struct PanickingSource;

impl BatchSource for PanickingSource {
    fn sample(&mut self, _batch_size: u64) -> SampleBatchResult {
        panic!("lost worker");
    }
}

fn quiet(batch_size: u64, workers: usize, duration_seconds: u64) -> RunConfig {
    RunConfig::new(batch_size, workers, duration_seconds).with_foreground(ForegroundMode::Off, 0)
}

fn scripted(factory: impl Fn(WorkerId) -> ScriptedSource + Send + Sync + 'static) -> RunController {
    RunController::with_sources(
        Box::new(ThreadSpawner),
        Arc::new(move |id: WorkerId| Box::new(factory(id)) as Box<dyn BatchSource>),
    )
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn four_workers_one_batch_each() {
    let mut controller = scripted(|_| ScriptedSource::once(785, 1000));
    controller.start(quiet(1000, 4, 0)).unwrap();

    assert!(wait_for(|| controller.counters().total_points == 4000));
    thread::sleep(Duration::from_millis(20));

    let snapshot = Reporter::new().snapshot(&controller, Instant::now());
    assert_eq!(snapshot.status, RunStatus::Running);
    assert_eq!(snapshot.total_points, 4000);
    assert_eq!(snapshot.inside_points, 3140);
    assert_relative_eq!(snapshot.pi_estimate().unwrap(), 3.14);
    assert_eq!(snapshot.active_workers, 4);
    controller.stop();
}

#[test]
fn empty_run_has_no_estimate() {
    let mut controller = scripted(|_| ScriptedSource::empty());
    controller.start(quiet(1000, 2, 0)).unwrap();
    thread::sleep(Duration::from_millis(20));

    let snapshot = Reporter::new().snapshot(&controller, Instant::now());
    assert_eq!(snapshot.total_points, 0);
    assert_eq!(snapshot.pi_estimate(), None);
    assert_eq!(snapshot.accuracy_percent(), None);
}

#[test]
fn stop_then_start_resumes_totals_and_clock() {
    let spawned = AtomicUsize::new(0);
    let mut controller = scripted(move |_| {
        if spawned.fetch_add(1, Ordering::SeqCst) < 2 {
            ScriptedSource::once(700, 1000)
        } else {
            ScriptedSource::empty()
        }
    });
    controller.start(quiet(1000, 2, 0)).unwrap();
    assert!(wait_for(|| controller.counters().total_points == 2000));

    controller.stop();
    assert_eq!(controller.state(), &RunState::Stopped);
    let before = controller.counters();

    thread::sleep(Duration::from_millis(50));
    controller.start(quiet(1000, 2, 0)).unwrap();
    thread::sleep(Duration::from_millis(20));

    let after = controller.counters();
    assert_eq!(after.total_points, before.total_points);
    assert_eq!(after.inside_points, before.inside_points);
    assert_eq!(after.started_at, before.started_at);
    assert!(after.elapsed(Instant::now()) >= Duration::from_millis(50));
}

#[test]
fn reset_always_clears() {
    let mut controller = RunController::threaded();
    controller.reset();
    assert!(controller.counters().is_fresh());

    controller.start(quiet(500, 2, 0)).unwrap();
    assert!(wait_for(|| controller.counters().total_points > 0));
    controller.reset();
    controller.reset();

    let counters = controller.counters();
    assert_eq!(counters.total_points, 0);
    assert_eq!(counters.inside_points, 0);
    assert_eq!(counters.started_at, None);
    assert_eq!(controller.state(), &RunState::Stopped);
    assert!(controller.workers().is_empty());

    thread::sleep(Duration::from_millis(20));
    assert_eq!(controller.counters().total_points, 0);
}

#[test]
fn duration_run_finishes_on_time_and_goes_quiet() {
    let mut controller = RunController::threaded();
    let mut reporter = Reporter::new();
    let config = RunConfig::new(1000, 2, 1).with_foreground(ForegroundMode::Counted, 500);
    controller.start(config).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let summary = loop {
        controller.sample_foreground();
        if let Some(report) = reporter.tick(&mut controller, Instant::now()) {
            if let Some(summary) = report.finished {
                break summary;
            }
        }
        assert!(Instant::now() < deadline, "run never finished");
        thread::sleep(Duration::from_millis(5));
    };

    assert!(summary.elapsed >= Duration::from_secs(1));
    assert!(
        summary.elapsed < Duration::from_millis(1000) + reporter.status_interval() * 3,
        "{:?}",
        summary.elapsed
    );
    assert_eq!(summary.workers_used, 2);
    assert!(summary.total_points > 0);
    assert!(summary.throughput.unwrap() > 0.0);
    assert!(matches!(controller.state(), RunState::Finished(_)));
    assert_eq!(controller.active_worker_count(), 0);

    let frozen = controller.counters();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(controller.counters().total_points, frozen.total_points);
    assert_eq!(controller.sample_foreground(), None);
}

#[test]
fn late_results_after_stop_are_dropped() {
    let (started_tx, started) = mpsc::channel();
    let (release, release_rx) = mpsc::channel();
    let held = Mutex::new(Some(HeldSource {
        started: started_tx,
        release: release_rx,
    }));

    let mut controller = RunController::with_sources(
        Box::new(ThreadSpawner),
        Arc::new(move |_: WorkerId| match held.lock().unwrap().take() {
            Some(source) => Box::new(source) as Box<dyn BatchSource>,
            None => Box::new(Sampler::seeded(1)),
        }),
    );
    controller.start(quiet(100, 1, 0)).unwrap();
    started.recv_timeout(Duration::from_secs(5)).unwrap();

    controller.stop();
    release.send(()).unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(controller.counters().total_points, 0);
}

#[test]
fn lost_worker_only_reduces_the_active_count() {
    let mut controller = RunController::with_sources(
        Box::new(ThreadSpawner),
        Arc::new(|id: WorkerId| match id {
            0 => Box::new(PanickingSource) as Box<dyn BatchSource>,
            _ => Box::new(Sampler::seeded(id as u64)),
        }),
    );
    controller.start(quiet(200, 3, 0)).unwrap();

    assert!(wait_for(|| controller.active_worker_count() == 2));
    assert_eq!(controller.workers().len(), 3);
    assert!(controller.is_running());

    let first = controller.counters().total_points;
    assert!(wait_for(|| controller.counters().total_points > first));
    let counters = controller.counters();
    assert!(counters.inside_points <= counters.total_points);
    controller.stop();
}

#[test]
fn live_batch_size_update_reaches_workers() {
    let mut controller = RunController::threaded();
    controller.start(quiet(1000, 2, 0)).unwrap();
    controller.update_batch_size(500).unwrap();

    assert!(wait_for(|| controller
        .workers()
        .iter()
        .all(|w| w.batch_size() == 500)));
    controller.stop();
}
