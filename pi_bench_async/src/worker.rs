use std::io;

use pi_bench::{
    AliveGuard, BatchSource, Mailbox, ResultSink, WorkerCommand, WorkerCore, WorkerHandle,
    WorkerId, WorkerSpawner, WorkerState, WorkerStatus,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task;

struct TaskMailbox(UnboundedSender<WorkerCommand>);

impl Mailbox for TaskMailbox {
    fn send(&self, command: WorkerCommand) -> bool {
        self.0.send(command).is_ok()
    }
}

/// One tokio task per unit; each batch runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    runtime: Handle,
}

impl TokioSpawner {
    pub fn new(runtime: Handle) -> Self {
        TokioSpawner { runtime }
    }

    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        TokioSpawner::new(Handle::current())
    }
}

impl WorkerSpawner for TokioSpawner {
    fn spawn(
        &self,
        id: WorkerId,
        source: Box<dyn BatchSource>,
        sink: ResultSink,
    ) -> io::Result<WorkerHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = WorkerStatus::new();
        let core = WorkerCore::new(id, source, sink, status.clone());

        self.runtime.spawn(run_task(core, rx));
        Ok(WorkerHandle::new(id, Box::new(TaskMailbox(tx)), status))
    }
}

async fn run_task(mut core: WorkerCore, mut commands: UnboundedReceiver<WorkerCommand>) {
    let id = core.id();
    let _alive = AliveGuard::new(id, core.status());

    loop {
        match core.state() {
            WorkerState::Idle => match commands.recv().await {
                Some(command) => core.apply(command),
                None => return,
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

                let batch = task::spawn_blocking(move || {
                    let delivered = core.run_batch();
                    (core, delivered)
                });
                core = match batch.await {
                    Ok((core, true)) => core,
                    Ok((_, false)) => return,
                    Err(error) => {
                        tracing::warn!(worker = id, %error, "worker unit lost");
                        return;
                    }
                };
                task::yield_now().await;
            }
            WorkerState::Stopped => return,
        }
    }
}
