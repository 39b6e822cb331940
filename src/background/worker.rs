use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder;
use tokio::sync::{broadcast, watch};
use tokio::task::spawn_blocking;

use crate::background::flows::ResizePipeline;
use crate::background::queue::DispatchReceiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

pub struct WorkerHandle {
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<WorkerState>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Ask the worker to stop once the task it is running, if any, completes.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn state(&self) -> WorkerState {
        *self.state_rx.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<WorkerState> {
        self.state_rx.clone()
    }

    /// Resolve once the worker has reached `Stopped`.
    pub async fn stopped(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx
            .wait_for(|state| *state == WorkerState::Stopped)
            .await;
    }

    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("resize worker thread panicked")),
            None => Ok(()),
        }
    }
}

/// Start the single worker thread consuming `receiver` in FIFO order.
///
/// The worker stops on the first message broadcast through `shutdown_tx`.
pub fn spawn_worker(
    pipeline: ResizePipeline,
    receiver: DispatchReceiver,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<WorkerHandle> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build worker runtime")?;
    let shutdown_rx = shutdown_tx.subscribe();
    let (state_tx, state_rx) = watch::channel(WorkerState::Idle);

    let thread = thread::Builder::new()
        .name("resize-worker".to_string())
        .spawn(move || {
            runtime.block_on(worker_loop(pipeline, receiver, shutdown_rx, state_tx));
        })
        .context("failed to spawn resize worker thread")?;

    Ok(WorkerHandle {
        shutdown_tx: shutdown_tx.clone(),
        state_rx,
        thread: Some(thread),
    })
}

async fn worker_loop(
    pipeline: ResizePipeline,
    mut receiver: DispatchReceiver,
    mut shutdown_rx: broadcast::Receiver<()>,
    state_tx: watch::Sender<WorkerState>,
) {
    info!("Resize worker started");

    loop {
        // Stop requests win over queued work
        let request = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            request = receiver.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        state_tx.send_replace(WorkerState::Running);
        let unfinished = request.clone();
        let runner = pipeline.clone();
        if let Err(e) = spawn_blocking(move || runner.run(request)).await {
            error!("Pipeline for task {} panicked: {}", unfinished.task_id, e);
            pipeline.record_failure(&unfinished, format!("resize pipeline panicked: {}", e));
        }
        state_tx.send_replace(WorkerState::Idle);
    }

    let drained = receiver.close_and_drain();
    if !drained.is_empty() {
        warn!("Failing {} queued task(s) left behind by shutdown", drained.len());
    }
    for request in &drained {
        pipeline.record_failure(request, "worker stopped before the task started");
    }

    state_tx.send_replace(WorkerState::Stopped);
    info!("Resize worker stopped");
}
