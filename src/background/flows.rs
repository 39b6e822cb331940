use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::background::types::{ResizeRequest, ScratchGuard, TaskId};
use crate::database::ops::image::ImageIndex;
use crate::database::ops::resize::ResizeIndex;
use crate::database::ops::task::TaskStore;
use crate::database::schema::resize::ResizeEntry;
use crate::database::schema::task::{ResolvedFiles, TaskRecord};
use crate::storage::blob::BlobStore;
use crate::storage::staging::FileStaging;
use crate::utils::now_ms;

/// Runs one resize request from fetch to finalize against injected collaborators.
#[derive(Clone)]
pub struct ResizePipeline {
    blobs: Arc<dyn BlobStore>,
    staging: Arc<dyn FileStaging>,
    resizes: Arc<dyn ResizeIndex>,
    images: Arc<dyn ImageIndex>,
    tasks: Arc<dyn TaskStore>,
    completions: broadcast::Sender<TaskId>,
}

impl ResizePipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        staging: Arc<dyn FileStaging>,
        resizes: Arc<dyn ResizeIndex>,
        images: Arc<dyn ImageIndex>,
        tasks: Arc<dyn TaskStore>,
        completions: broadcast::Sender<TaskId>,
    ) -> Self {
        Self {
            blobs,
            staging,
            resizes,
            images,
            tasks,
            completions,
        }
    }

    /// Execute the pipeline and record its terminal outcome.
    ///
    /// Blocking; the worker calls it from `spawn_blocking`.
    pub fn run(&self, request: ResizeRequest) {
        let start_time = Instant::now();
        let record = TaskRecord::in_progress(
            request.image_reference.clone(),
            request.width,
            request.submitted_at,
        );

        match self.execute(&request) {
            Ok(files) => {
                // Step 7: Finalize the task record
                let done = record.into_done(files, now_ms());
                match self.tasks.finish(&request.task_id, &done) {
                    Ok(()) => info!(
                        duration = &*format!("{:?}", start_time.elapsed());
                        "Resized {} to width {} (task {})",
                        request.image_reference, request.width, request.task_id
                    ),
                    Err(e) => error!("Failed to mark task {} done: {:?}", request.task_id, e),
                }
                self.announce(request.task_id);
            }
            Err(e) => {
                warn!(
                    duration = &*format!("{:?}", start_time.elapsed());
                    "Task {} failed: {:#}", request.task_id, e
                );
                self.record_failure(&request, format!("{:#}", e));
            }
        }
    }

    /// Mark `request` as `Error` without running it.
    pub fn record_failure(&self, request: &ResizeRequest, message: impl Into<String>) {
        let failed = TaskRecord::in_progress(
            request.image_reference.clone(),
            request.width,
            request.submitted_at,
        )
        .into_failed(message, now_ms());
        if let Err(e) = self.tasks.finish(&request.task_id, &failed) {
            error!("Failed to mark task {} as failed: {:?}", request.task_id, e);
        }
        self.announce(request.task_id);
    }

    // No subscribers is the common case
    fn announce(&self, task_id: TaskId) {
        let _ = self.completions.send(task_id);
    }

    fn execute(&self, request: &ResizeRequest) -> Result<ResolvedFiles> {
        let _scratch = ScratchGuard::new(Arc::clone(&self.staging));
        let reference = request.image_reference.as_str();

        // Step 1: Fetch the original
        let bytes = self
            .blobs
            .fetch(reference)
            .context(format!("failed to fetch source image {}", reference))?;

        // Step 2: Stage it into the scratch area
        let staged = self
            .staging
            .save(reference, &bytes)
            .context(format!("failed to stage {}", reference))?;

        // Step 3: Resize
        let resized = self
            .staging
            .resize(&staged, request.width)
            .context(format!("failed to resize {} to width {}", reference, request.width))?;

        // Step 4: Publish the resized variant
        let mut body = self.staging.open_for_upload(&resized)?;
        let resized_path = self
            .blobs
            .publish(&resized.name, &mut body)
            .context(format!("failed to publish {}", resized.name))?;

        // Step 5: Index the resize under the original
        self.resizes
            .append(
                reference,
                ResizeEntry {
                    resized_file_name: resized.name.clone(),
                    resized_file_path: resized_path.clone(),
                    width: request.width,
                },
            )
            .context(format!("failed to index resize of {}", reference))?;

        // Step 6: Recover the original's canonical location
        let image = self
            .images
            .get(reference)?
            .ok_or_else(|| anyhow!("image {} is not in the catalog", reference))?;

        Ok(ResolvedFiles {
            source_file_name: image.file_name,
            source_file_path: image.file_path,
            resized_file_name: resized.name,
            resized_file_path: resized_path,
        })
    }
}
