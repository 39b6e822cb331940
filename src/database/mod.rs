pub mod ops;
pub mod schema;

use anyhow::{Context, Result};
use log::info;
use redb::Database;
use redb::backends::InMemoryBackend;
use std::path::Path;
use std::sync::Arc;

use crate::database::schema::image::IMAGE_TABLE;
use crate::database::schema::resize::RESIZE_TABLE;
use crate::database::schema::task::TASK_TABLE;
use crate::database::schema::user_image::USER_IMAGE_TABLE;

pub use ops::Stores;

/// Open (or create) the redb file at `path` and make sure every table exists.
pub fn open_database(path: &Path) -> Result<Arc<Database>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("failed to create database directory {:?}", parent))?;
    }
    let db = Database::create(path).context(format!("failed to open database {:?}", path))?;
    initialize_tables(&db)?;
    info!("Opened database {:?}", path);
    Ok(Arc::new(db))
}

/// Database living purely in memory; nothing survives the process.
pub fn open_in_memory() -> Result<Arc<Database>> {
    let db = Database::builder()
        .create_with_backend(InMemoryBackend::new())
        .context("failed to create in-memory database")?;
    initialize_tables(&db)?;
    Ok(Arc::new(db))
}

fn initialize_tables(db: &Database) -> Result<()> {
    let txn = db.begin_write()?;
    {
        let _ = txn.open_table(TASK_TABLE)?;
        let _ = txn.open_table(RESIZE_TABLE)?;
        let _ = txn.open_table(IMAGE_TABLE)?;
        let _ = txn.open_table(USER_IMAGE_TABLE)?;
    }
    txn.commit()?;
    Ok(())
}
