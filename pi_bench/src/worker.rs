use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::aggregator::ResultSink;
use crate::sampler::BatchSource;

pub type WorkerId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Start { batch_size: u64 },
    Stop,
    UpdateBatch { batch_size: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

/// Flags a unit publishes for its handle.
#[derive(Debug)]
pub struct WorkerStatus {
    running: AtomicBool,
    alive: AtomicBool,
    stop_requested: AtomicBool,
    batch_size: AtomicU64,
}

impl WorkerStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(WorkerStatus {
            running: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            batch_size: AtomicU64::new(0),
        })
    }
}

/// Clears the liveness flag when the unit's execution context ends,
/// including by panic.
pub struct AliveGuard {
    id: WorkerId,
    status: Arc<WorkerStatus>,
}

impl AliveGuard {
    pub fn new(id: WorkerId, status: Arc<WorkerStatus>) -> Self {
        AliveGuard { id, status }
    }
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.status.running.store(false, Ordering::Release);
        self.status.alive.store(false, Ordering::Release);
        if thread::panicking() {
            tracing::warn!(worker = self.id, "worker unit lost");
        } else {
            tracing::debug!(worker = self.id, "worker unit exited");
        }
    }
}

/// Command transport into a unit's execution context.
pub trait Mailbox: Send {
    /// Returns false if the unit is gone.
    fn send(&self, command: WorkerCommand) -> bool;
}

impl Mailbox for Sender<WorkerCommand> {
    fn send(&self, command: WorkerCommand) -> bool {
        Sender::send(self, command).is_ok()
    }
}

/// Controller-side handle to one spawned unit. Dropping it closes the
/// mailbox, which the unit treats as `Stop`.
pub struct WorkerHandle {
    id: WorkerId,
    mailbox: Box<dyn Mailbox>,
    status: Arc<WorkerStatus>,
}

impl WorkerHandle {
    pub fn new(id: WorkerId, mailbox: Box<dyn Mailbox>, status: Arc<WorkerStatus>) -> Self {
        WorkerHandle {
            id,
            mailbox,
            status,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.status.running.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.status.alive.load(Ordering::Acquire)
    }

    pub fn batch_size(&self) -> u64 {
        self.status.batch_size.load(Ordering::Acquire)
    }

    pub fn start(&self, batch_size: u64) -> bool {
        self.mailbox.send(WorkerCommand::Start { batch_size })
    }

    /// Raises the stop flag before queueing `Stop`, so the unit starts no
    /// new batch once this returns even if its mailbox was already drained.
    pub fn stop(&self) -> bool {
        self.status.stop_requested.store(true, Ordering::Release);
        self.mailbox.send(WorkerCommand::Stop)
    }

    pub fn update_batch(&self, batch_size: u64) -> bool {
        self.mailbox.send(WorkerCommand::UpdateBatch { batch_size })
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .field("alive", &self.is_alive())
            .field("batch_size", &self.batch_size())
            .finish()
    }
}

/// The per-unit state machine, independent of what executes it.
pub struct WorkerCore {
    id: WorkerId,
    source: Box<dyn BatchSource>,
    sink: ResultSink,
    status: Arc<WorkerStatus>,
    state: WorkerState,
    batch_size: u64,
}

impl WorkerCore {
    pub fn new(
        id: WorkerId,
        source: Box<dyn BatchSource>,
        sink: ResultSink,
        status: Arc<WorkerStatus>,
    ) -> Self {
        WorkerCore {
            id,
            source,
            sink,
            status,
            state: WorkerState::Idle,
            batch_size: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn status(&self) -> Arc<WorkerStatus> {
        self.status.clone()
    }

    pub fn apply(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Start { batch_size } => {
                if self.state == WorkerState::Stopped {
                    return;
                }
                self.set_batch_size(batch_size);
                self.state = WorkerState::Running;
                self.status.running.store(true, Ordering::Release);
            }
            WorkerCommand::UpdateBatch { batch_size } => self.set_batch_size(batch_size),
            WorkerCommand::Stop => {
                self.state = WorkerState::Stopped;
                self.status.running.store(false, Ordering::Release);
            }
        }
    }

    /// Applies a stop raised through the handle ahead of the mailbox.
    pub fn observe_stop(&mut self) {
        if self.status.stop_requested.load(Ordering::Acquire) {
            self.apply(WorkerCommand::Stop);
        }
    }

    /// Runs one batch at the current size and posts the result. Returns
    /// false if nobody is listening anymore.
    pub fn run_batch(&mut self) -> bool {
        let result = self.source.sample(self.batch_size);
        self.sink.post(result)
    }

    fn set_batch_size(&mut self, batch_size: u64) {
        self.batch_size = batch_size;
        self.status.batch_size.store(batch_size, Ordering::Release);
    }
}

/// Starts worker units on some execution context.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(
        &self,
        id: WorkerId,
        source: Box<dyn BatchSource>,
        sink: ResultSink,
    ) -> io::Result<WorkerHandle>;
}

/// One OS thread per unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl WorkerSpawner for ThreadSpawner {
    fn spawn(
        &self,
        id: WorkerId,
        source: Box<dyn BatchSource>,
        sink: ResultSink,
    ) -> io::Result<WorkerHandle> {
        let (tx, rx) = mpsc::channel();
        let status = WorkerStatus::new();
        let core = WorkerCore::new(id, source, sink, status.clone());

        thread::Builder::new()
            .name(format!("pi-worker-{id}"))
            .spawn(move || run_thread(core, rx))?;

        Ok(WorkerHandle::new(id, Box::new(tx), status))
    }
}

fn run_thread(mut core: WorkerCore, commands: Receiver<WorkerCommand>) {
    let _alive = AliveGuard::new(core.id(), core.status());

    loop {
        match core.state() {
            WorkerState::Idle => match commands.recv() {
                Ok(command) => core.apply(command),
                Err(_) => return,
            },
            WorkerState::Running => {
                loop {
                    match commands.try_recv() {
                        Ok(command) => core.apply(command),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            core.apply(WorkerCommand::Stop);
                            break;
                        }
                    }
                }
                core.observe_stop();
                if core.state() != WorkerState::Running {
                    continue;
                }
                if !core.run_batch() {
                    return;
                }
                thread::yield_now();
            }
            WorkerState::Stopped => return,
        }
    }
}
