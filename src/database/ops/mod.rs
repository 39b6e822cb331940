pub mod image;
pub mod resize;
pub mod task;
pub mod user_image;

use anyhow::Result;
use bitcode::{DecodeOwned, Encode};
use redb::{Database, ReadableTable, TableDefinition};
use std::sync::Arc;

use self::image::ImageTable;
use self::resize::ResizeTable;
use self::task::TaskTable;
use self::user_image::UserImageTable;

/// Every durable store, built once over a single redb file and shared by `Arc`.
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<TaskTable>,
    pub resizes: Arc<ResizeTable>,
    pub images: Arc<ImageTable>,
    pub user_images: Arc<UserImageTable>,
}

impl Stores {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            tasks: Arc::new(TaskTable::new(Arc::clone(&db))),
            resizes: Arc::new(ResizeTable::new(Arc::clone(&db))),
            images: Arc::new(ImageTable::new(Arc::clone(&db))),
            user_images: Arc::new(UserImageTable::new(db)),
        }
    }
}

fn read_value<T: DecodeOwned>(
    db: &Database,
    table: TableDefinition<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Option<T>> {
    let txn = db.begin_read()?;
    let table = txn.open_table(table)?;
    let value = match table.get(key)? {
        Some(access) => Some(bitcode::decode(access.value())?),
        None => None,
    };
    Ok(value)
}

fn write_value<T: Encode>(
    db: &Database,
    table: TableDefinition<&'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> Result<()> {
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(table)?;
        table.insert(key, bitcode::encode(value).as_slice())?;
    }
    txn.commit()?;
    Ok(())
}

fn read_list<T: DecodeOwned>(
    db: &Database,
    table: TableDefinition<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Vec<T>> {
    Ok(read_value::<Vec<T>>(db, table, key)?.unwrap_or_default())
}

/// Read-merge-write of a list value inside one write transaction.
fn append_list<T: Encode + DecodeOwned>(
    db: &Database,
    table: TableDefinition<&'static str, &'static [u8]>,
    key: &str,
    items: Vec<T>,
) -> Result<()> {
    update_list(db, table, key, |list: &mut Vec<T>| list.extend(items))
}

/// Apply `update` to the stored list under `key` and write it back in one transaction.
fn update_list<T: Encode + DecodeOwned>(
    db: &Database,
    table: TableDefinition<&'static str, &'static [u8]>,
    key: &str,
    update: impl FnOnce(&mut Vec<T>),
) -> Result<()> {
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(table)?;
        let mut list: Vec<T> = match table.get(key)? {
            Some(access) => bitcode::decode(access.value())?,
            None => Vec::new(),
        };
        update(&mut list);
        table.insert(key, bitcode::encode(&list).as_slice())?;
    }
    txn.commit()?;
    Ok(())
}
