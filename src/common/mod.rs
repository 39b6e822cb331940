pub mod errors;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_MAX_TARGET_WIDTH: u32 = 4_096;

/// Upper bound on width * height of a resized image.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

pub const THUMB_PREFIX: &str = "thumb";

pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "gif"];

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

pub static CURRENT_NUM_THREADS: LazyLock<usize> = LazyLock::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
});

// Rocket-specific Tokio Runtime
// This runtime is dedicated to handling network requests, with thread names clearly labeled.
pub static ROCKET_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(*CURRENT_NUM_THREADS)
        .thread_name("rocket-io-worker")
        .enable_all()
        .build()
        .expect("Failed to build Rocket Tokio runtime")
});
