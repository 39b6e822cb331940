use anyhow::{Context, Result, anyhow};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::spawn_blocking;

use crate::background::queue::{DispatchError, DispatchSender};
use crate::background::types::{ResizeRequest, TaskId, new_task_id};
use crate::common::errors::ServiceError;
use crate::database::ops::task::TaskStore;
use crate::database::schema::task::TaskRecord;
use crate::utils::{now_ms, validate_image_name};

/// Submission and query entry points in front of the dispatch queue.
pub struct ResizeProcessor {
    tasks: Arc<dyn TaskStore>,
    sender: DispatchSender,
    completions: broadcast::Sender<TaskId>,
    max_width: u32,
}

impl ResizeProcessor {
    /// `completions` carries the id of every task the pipeline finishes.
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        sender: DispatchSender,
        completions: broadcast::Sender<TaskId>,
        max_width: u32,
    ) -> Self {
        Self {
            tasks,
            sender,
            completions,
            max_width,
        }
    }

    pub fn check_width(&self, width: u32) -> Result<(), ServiceError> {
        if width == 0 || width > self.max_width {
            return Err(ServiceError::InvalidWidth(self.max_width));
        }
        Ok(())
    }

    /// Record the task as `InProgress`, then hand it to the worker.
    ///
    /// Returns once the queue has accepted the request. If the hand-off fails
    /// the write-ahead record is removed again.
    pub async fn submit(&self, image_reference: &str, width: u32) -> Result<TaskId, ServiceError> {
        validate_image_name(image_reference)?;
        self.check_width(width)?;

        let request = ResizeRequest {
            task_id: new_task_id(),
            image_reference: image_reference.to_string(),
            width,
            submitted_at: now_ms(),
        };
        let task_id = request.task_id;

        // Step 1: Write-ahead record
        let record = TaskRecord::in_progress(
            request.image_reference.clone(),
            request.width,
            request.submitted_at,
        );
        let tasks = Arc::clone(&self.tasks);
        spawn_blocking(move || tasks.put(&task_id, &record))
            .await
            .context("failed to join write-ahead task")??;

        // Step 2: Hand off to the worker
        let failure = match self.sender.dispatch(request).await {
            Ok(()) => {
                info!("Queued task {} ({} -> width {})", task_id, image_reference, width);
                return Ok(task_id);
            }
            Err(DispatchError::Full(_)) => ServiceError::QueueFull,
            Err(DispatchError::Closed(_)) => ServiceError::WorkerStopped,
        };

        let tasks = Arc::clone(&self.tasks);
        match spawn_blocking(move || tasks.remove(&task_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to withdraw record of rejected task {}: {:?}", task_id, e),
            Err(e) => error!("Failed to join withdrawal of task {}: {}", task_id, e),
        }
        Err(failure)
    }

    /// Submit through the same queue and wait until the worker has finished the task.
    pub async fn submit_and_wait(
        &self,
        image_reference: &str,
        width: u32,
    ) -> Result<TaskRecord, ServiceError> {
        // Subscribe first so the completion cannot slip past
        let mut completions = self.completions.subscribe();
        let task_id = self.submit(image_reference, width).await?;

        loop {
            match completions.recv().await {
                Ok(finished) if finished == task_id => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    if self.is_finished(&task_id).await? {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        let record = self
            .query(&task_id)
            .await?
            .ok_or_else(|| anyhow!("task {} has no record after finishing", task_id))?;
        Ok(record)
    }

    async fn is_finished(&self, task_id: &str) -> Result<bool> {
        Ok(self
            .query(task_id)
            .await?
            .is_some_and(|record| record.status.is_terminal()))
    }

    /// Current record for `task_id`; `None` if it was never submitted.
    pub async fn query(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let tasks = Arc::clone(&self.tasks);
        let task_id = task_id.to_string();
        let record = spawn_blocking(move || tasks.get(&task_id))
            .await
            .context("failed to join task lookup")??;
        Ok(record)
    }

    pub fn queued(&self) -> usize {
        self.sender.queued()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::queue::dispatch_queue;
    use anyhow::bail;
    use std::time::Duration;

    /// Task store whose writes always fail.
    struct ReadOnlyTasks;

    impl TaskStore for ReadOnlyTasks {
        fn get(&self, _task_id: &str) -> Result<Option<TaskRecord>> {
            Ok(None)
        }

        fn put(&self, _task_id: &str, _record: &TaskRecord) -> Result<()> {
            bail!("database is read-only")
        }

        fn remove(&self, _task_id: &str) -> Result<()> {
            bail!("database is read-only")
        }

        fn finish(&self, _task_id: &str, _record: &TaskRecord) -> Result<()> {
            bail!("database is read-only")
        }

        fn fail_orphaned(&self, _reason: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn processor(tasks: Arc<dyn TaskStore>) -> ResizeProcessor {
        let (sender, _receiver) = dispatch_queue(4, Duration::ZERO);
        let (completions, _) = broadcast::channel(4);
        ResizeProcessor::new(tasks, sender, completions, 1_000)
    }

    #[tokio::test]
    async fn failed_write_ahead_queues_nothing() {
        let processor = processor(Arc::new(ReadOnlyTasks));

        let err = processor.submit("cat.png", 100).await.unwrap_err();
        match err {
            ServiceError::Storage(inner) => {
                assert!(inner.to_string().contains("read-only"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(processor.queued(), 0);
    }

    #[tokio::test]
    async fn widths_outside_the_limit_are_rejected() {
        let processor = processor(Arc::new(ReadOnlyTasks));

        for width in [0, 1_001, 60_000] {
            assert!(matches!(
                processor.submit("cat.png", width).await,
                Err(ServiceError::InvalidWidth(1_000))
            ));
        }
        assert!(processor.check_width(1_000).is_ok());
        assert_eq!(processor.queued(), 0);
    }
}
