use anyhow::{Context, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::common::{DEFAULT_MAX_TARGET_WIDTH, DEFAULT_QUEUE_CAPACITY, DEFAULT_SUBMIT_TIMEOUT_MS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// redb file holding the task, resize, image and upload tables
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Root directory of the local blob store
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
    /// URL prefix under which published blobs are served
    #[serde(default = "default_public_blob_prefix")]
    pub public_blob_prefix: String,
    /// Scratch area used while resizing
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long a submission may wait for queue space; 0 rejects immediately
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    /// Widest resize a caller may request
    #[serde(default = "default_max_target_width")]
    pub max_target_width: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_limit_mb")]
    pub upload_limit_mb: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./db/resizer.redb")
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("./object/blobs")
}

fn default_public_blob_prefix() -> String {
    "/blobs".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_submit_timeout_ms() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT_MS
}

fn default_max_target_width() -> u32 {
    DEFAULT_MAX_TARGET_WIDTH
}

fn default_port() -> u16 {
    8085
}

fn default_upload_limit_mb() -> u64 {
    32
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            blob_root: default_blob_root(),
            public_blob_prefix: default_public_blob_prefix(),
            scratch_dir: default_scratch_dir(),
            queue_capacity: default_queue_capacity(),
            submit_timeout_ms: default_submit_timeout_ms(),
            max_target_width: default_max_target_width(),
            port: default_port(),
            upload_limit_mb: default_upload_limit_mb(),
        }
    }
}

impl AppConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Read `RESIZER_*` variables, honouring a `.env` file in the working directory.
pub fn load_config() -> Result<AppConfig> {
    dotenv().ok();
    let config = envy::prefixed("RESIZER_")
        .from_env::<AppConfig>()
        .context("failed to read RESIZER_* environment variables")?;
    Ok(config)
}
