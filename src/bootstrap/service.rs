use anyhow::{Context, Result};
use log::{info, warn};
use redb::Database;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::background::flows::ResizePipeline;
use crate::background::processor::ResizeProcessor;
use crate::background::queue::dispatch_queue;
use crate::background::worker::{WorkerHandle, WorkerState, spawn_worker};
use crate::config::AppConfig;
use crate::database::ops::Stores;
use crate::database::ops::task::TaskStore;
use crate::operations::catalog::Catalog;
use crate::storage::blob::{BlobStore, LocalBlobStore};
use crate::storage::staging::{FileStaging, ScratchDir};

pub const RESTART_INTERRUPTED: &str = "interrupted by a service restart";

const COMPLETION_BACKLOG: usize = 64;

/// Everything request handlers need, shared through Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ResizeProcessor>,
    pub catalog: Arc<Catalog>,
    pub worker_state: watch::Receiver<WorkerState>,
}

/// Build the default collaborators from `config` and start the worker.
pub fn start_service(
    config: &AppConfig,
    db: Arc<Database>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(AppState, WorkerHandle)> {
    let blobs = Arc::new(LocalBlobStore::new(
        &config.blob_root,
        config.public_blob_prefix.as_str(),
    )?);
    let staging = Arc::new(ScratchDir::new(&config.scratch_dir)?);
    start_service_with(config, Stores::new(db), blobs, staging, shutdown_tx)
}

/// Wire the core around explicit collaborators.
///
/// Orphaned `InProgress` records from a previous run are failed before the
/// worker takes its first task.
pub fn start_service_with(
    config: &AppConfig,
    stores: Stores,
    blobs: Arc<dyn BlobStore>,
    staging: Arc<dyn FileStaging>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(AppState, WorkerHandle)> {
    let orphaned = stores
        .tasks
        .fail_orphaned(RESTART_INTERRUPTED)
        .context("failed to recover interrupted tasks")?;
    if !orphaned.is_empty() {
        warn!("Marked {} interrupted task(s) as failed", orphaned.len());
    }

    let (sender, receiver) = dispatch_queue(config.queue_capacity, config.submit_timeout());
    let (completions, _) = broadcast::channel(COMPLETION_BACKLOG);
    let pipeline = ResizePipeline::new(
        Arc::clone(&blobs),
        staging,
        stores.resizes.clone(),
        stores.images.clone(),
        stores.tasks.clone(),
        completions.clone(),
    );
    let worker = spawn_worker(pipeline, receiver, shutdown_tx)?;

    let processor = Arc::new(ResizeProcessor::new(
        stores.tasks.clone(),
        sender,
        completions,
        config.max_target_width,
    ));
    let catalog = Arc::new(Catalog::new(
        blobs,
        stores.images.clone(),
        stores.resizes.clone(),
        stores.user_images.clone(),
    ));

    info!(
        "Service ready (queue capacity {}, submit timeout {:?}, max width {})",
        processor.capacity(),
        config.submit_timeout(),
        config.max_target_width
    );

    let state = AppState {
        processor,
        catalog,
        worker_state: worker.state_receiver(),
    };
    Ok((state, worker))
}
