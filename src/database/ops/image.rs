use anyhow::Result;
use redb::Database;
use std::sync::Arc;

use super::{read_value, write_value};
use crate::database::schema::image::{IMAGE_TABLE, ImageRecord};

/// Catalog of uploaded originals.
pub trait ImageIndex: Send + Sync {
    fn get(&self, image_reference: &str) -> Result<Option<ImageRecord>>;

    fn put(&self, record: &ImageRecord) -> Result<()>;
}

pub struct ImageTable {
    db: Arc<Database>,
}

impl ImageTable {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ImageIndex for ImageTable {
    fn get(&self, image_reference: &str) -> Result<Option<ImageRecord>> {
        read_value(&self.db, IMAGE_TABLE, image_reference)
    }

    fn put(&self, record: &ImageRecord) -> Result<()> {
        write_value(&self.db, IMAGE_TABLE, &record.id, record)
    }
}
