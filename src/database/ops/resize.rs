use anyhow::Result;
use redb::Database;
use std::sync::Arc;

use super::{append_list, read_list};
use crate::database::schema::resize::{RESIZE_TABLE, ResizeEntry};

/// Every resize produced from an original, keyed by the original's reference.
pub trait ResizeIndex: Send + Sync {
    fn get(&self, image_reference: &str) -> Result<Vec<ResizeEntry>>;

    fn append(&self, image_reference: &str, entry: ResizeEntry) -> Result<()>;
}

pub struct ResizeTable {
    db: Arc<Database>,
}

impl ResizeTable {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ResizeIndex for ResizeTable {
    fn get(&self, image_reference: &str) -> Result<Vec<ResizeEntry>> {
        read_list(&self.db, RESIZE_TABLE, image_reference)
    }

    fn append(&self, image_reference: &str, entry: ResizeEntry) -> Result<()> {
        append_list(&self.db, RESIZE_TABLE, image_reference, vec![entry])
    }
}
