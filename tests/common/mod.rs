#![allow(dead_code)]

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use image_resizer::background::worker::WorkerHandle;
use image_resizer::bootstrap::service::{AppState, start_service_with};
use image_resizer::config::AppConfig;
use image_resizer::database::Stores;
use image_resizer::database::open_in_memory;
use image_resizer::database::schema::task::{TASK_TABLE, TaskRecord};
use image_resizer::storage::blob::LocalBlobStore;
use image_resizer::storage::staging::{FileStaging, ScratchDir, StagedFile};
use redb::{Database, ReadableTableMetadata};
use std::io::{Cursor, Read};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([10, 200, 90, 255]),
    ));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Blocks pipeline runs inside `resize` while closed.
#[derive(Default)]
pub struct Gate {
    closed: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn open(&self) {
        *self.closed.lock().unwrap() = false;
        self.cond.notify_all();
    }

    fn pass(&self) {
        let mut closed = self.closed.lock().unwrap();
        while *closed {
            closed = self.cond.wait(closed).unwrap();
        }
    }
}

/// Scratch directory that records resize/clear calls and can hold or crash runs.
pub struct ObservedStaging {
    inner: ScratchDir,
    pub events: Mutex<Vec<String>>,
    pub gate: Gate,
    pub panic_on_width: Option<u32>,
}

impl ObservedStaging {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl FileStaging for ObservedStaging {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<StagedFile> {
        self.inner.save(name, bytes)
    }

    fn resize(&self, source: &StagedFile, width: u32) -> Result<StagedFile> {
        self.events.lock().unwrap().push(format!("resize:{}", width));
        self.gate.pass();
        if self.panic_on_width == Some(width) {
            panic!("resize exploded at width {}", width);
        }
        self.inner.resize(source, width)
    }

    fn open_for_upload(&self, file: &StagedFile) -> Result<Box<dyn Read + Send>> {
        self.inner.open_for_upload(file)
    }

    fn clear(&self) {
        self.events.lock().unwrap().push("clear".to_string());
        self.inner.clear();
    }
}

pub struct Harness {
    pub temp_dir: TempDir,
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub stores: Stores,
    pub blobs: Arc<LocalBlobStore>,
    pub staging: Arc<ObservedStaging>,
    pub state: AppState,
    pub worker: WorkerHandle,
    pub shutdown_tx: broadcast::Sender<()>,
}

pub struct HarnessOptions {
    pub queue_capacity: usize,
    pub submit_timeout_ms: u64,
    pub panic_on_width: Option<u32>,
    pub seed: Vec<(String, TaskRecord)>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            submit_timeout_ms: 0,
            panic_on_width: None,
            seed: Vec::new(),
        }
    }
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

pub fn harness_with(options: HarnessOptions) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig {
        database_path: temp_dir.path().join("db/resizer.redb"),
        blob_root: temp_dir.path().join("blobs"),
        scratch_dir: temp_dir.path().join("tmp"),
        queue_capacity: options.queue_capacity,
        submit_timeout_ms: options.submit_timeout_ms,
        ..AppConfig::default()
    };

    let db = open_in_memory().unwrap();
    let stores = Stores::new(Arc::clone(&db));
    for (task_id, record) in &options.seed {
        use image_resizer::database::ops::task::TaskStore;
        stores.tasks.put(task_id, record).unwrap();
    }

    let blobs = Arc::new(LocalBlobStore::new(&config.blob_root, "/blobs").unwrap());
    let staging = Arc::new(ObservedStaging {
        inner: ScratchDir::new(&config.scratch_dir).unwrap(),
        events: Mutex::new(Vec::new()),
        gate: Gate::default(),
        panic_on_width: options.panic_on_width,
    });

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (state, worker) = start_service_with(
        &config,
        stores.clone(),
        blobs.clone(),
        staging.clone(),
        &shutdown_tx,
    )
    .unwrap();

    Harness {
        temp_dir,
        config,
        db,
        stores,
        blobs,
        staging,
        state,
        worker,
        shutdown_tx,
    }
}

impl Harness {
    pub fn upload_png(&self, name: &str, width: u32, height: u32) -> String {
        self.state
            .catalog
            .upload("tester", name, &png_bytes(width, height))
            .unwrap()
    }

    /// Number of task records currently stored.
    pub fn task_count(&self) -> u64 {
        let txn = self.db.begin_read().unwrap();
        let table = txn.open_table(TASK_TABLE).unwrap();
        table.len().unwrap()
    }

    /// Poll until the task reaches a terminal state.
    pub async fn wait_terminal(&self, task_id: &str) -> TaskRecord {
        for _ in 0..1000 {
            if let Some(record) = self.state.processor.query(task_id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never finished", task_id);
    }

    pub async fn stop_worker(&self) {
        self.worker.stop();
        self.worker.stopped().await;
    }
}
