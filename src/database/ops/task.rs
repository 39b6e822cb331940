use anyhow::{Result, bail};
use log::warn;
use redb::{Database, ReadableTable};
use std::sync::Arc;

use super::{read_value, write_value};
use crate::database::schema::task::{TASK_TABLE, TaskRecord, TaskStatus};
use crate::utils::now_ms;

/// Durable record of task status, keyed by task id.
pub trait TaskStore: Send + Sync {
    fn get(&self, task_id: &str) -> Result<Option<TaskRecord>>;

    fn put(&self, task_id: &str, record: &TaskRecord) -> Result<()>;

    fn remove(&self, task_id: &str) -> Result<()>;

    /// Write a terminal record. Fails if the stored record is already terminal.
    fn finish(&self, task_id: &str, record: &TaskRecord) -> Result<()>;

    /// Re-mark every `InProgress` record as `Error`, returning the affected ids.
    fn fail_orphaned(&self, reason: &str) -> Result<Vec<String>>;
}

pub struct TaskTable {
    db: Arc<Database>,
}

impl TaskTable {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl TaskStore for TaskTable {
    fn get(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        read_value(&self.db, TASK_TABLE, task_id)
    }

    fn put(&self, task_id: &str, record: &TaskRecord) -> Result<()> {
        write_value(&self.db, TASK_TABLE, task_id, record)
    }

    fn remove(&self, task_id: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TASK_TABLE)?;
            table.remove(task_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn finish(&self, task_id: &str, record: &TaskRecord) -> Result<()> {
        if !record.status.is_terminal() {
            bail!("refusing to finish task {} with status {}", task_id, record.status);
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TASK_TABLE)?;
            let existing: Option<TaskRecord> = match table.get(task_id)? {
                Some(access) => Some(bitcode::decode(access.value())?),
                None => None,
            };
            match existing {
                Some(existing) if existing.status.is_terminal() => {
                    bail!(
                        "task {} already finished with status {}",
                        task_id,
                        existing.status
                    );
                }
                Some(_) => {}
                None => {
                    warn!(
                        "Task {} has no stored record; writing its {} outcome anyway",
                        task_id, record.status
                    );
                }
            }
            table.insert(task_id, bitcode::encode(record).as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn fail_orphaned(&self, reason: &str) -> Result<Vec<String>> {
        let finished_at = now_ms();
        let txn = self.db.begin_write()?;
        let mut orphaned = Vec::new();
        {
            let mut table = txn.open_table(TASK_TABLE)?;
            let mut pending = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let record: TaskRecord = bitcode::decode(value.value())?;
                if record.status == TaskStatus::InProgress {
                    pending.push((key.value().to_string(), record));
                }
            }
            for (task_id, record) in pending {
                let failed = record.into_failed(reason, finished_at);
                table.insert(task_id.as_str(), bitcode::encode(&failed).as_slice())?;
                orphaned.push(task_id);
            }
        }
        txn.commit()?;
        Ok(orphaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;
    use crate::database::schema::task::ResolvedFiles;

    fn table() -> TaskTable {
        TaskTable::new(open_in_memory().unwrap())
    }

    fn resolved() -> ResolvedFiles {
        ResolvedFiles {
            source_file_name: "a.png".into(),
            source_file_path: "/blobs/aa/a.png".into(),
            resized_file_name: "thumb10.a.png".into(),
            resized_file_path: "/blobs/bb/thumb10.a.png".into(),
        }
    }

    #[test]
    fn unknown_task_is_absent() {
        assert!(table().get("nope").unwrap().is_none());
    }

    #[test]
    fn put_then_get() {
        let tasks = table();
        let record = TaskRecord::in_progress("a.png", 10, 1);
        tasks.put("t1", &record).unwrap();
        assert_eq!(tasks.get("t1").unwrap(), Some(record));
    }

    #[test]
    fn finish_is_monotonic() {
        let tasks = table();
        let record = TaskRecord::in_progress("a.png", 10, 1);
        tasks.put("t1", &record).unwrap();
        tasks
            .finish("t1", &record.clone().into_done(resolved(), 2))
            .unwrap();

        let second = tasks.finish("t1", &record.into_failed("late", 3));
        assert!(second.is_err());
        assert_eq!(tasks.get("t1").unwrap().unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn finish_rejects_non_terminal_status() {
        let tasks = table();
        let record = TaskRecord::in_progress("a.png", 10, 1);
        assert!(tasks.finish("t1", &record).is_err());
    }

    #[test]
    fn finish_writes_missing_record() {
        let tasks = table();
        let record = TaskRecord::in_progress("a.png", 10, 1).into_failed("boom", 2);
        tasks.finish("ghost", &record).unwrap();
        assert_eq!(tasks.get("ghost").unwrap(), Some(record));
    }

    #[test]
    fn remove_deletes_record() {
        let tasks = table();
        tasks
            .put("t1", &TaskRecord::in_progress("a.png", 10, 1))
            .unwrap();
        tasks.remove("t1").unwrap();
        assert!(tasks.get("t1").unwrap().is_none());
    }

    #[test]
    fn orphaned_in_progress_records_become_errors() {
        let tasks = table();
        let pending = TaskRecord::in_progress("a.png", 10, 1);
        let done = pending.clone().into_done(resolved(), 2);
        tasks.put("pending", &pending).unwrap();
        tasks.put("done", &done).unwrap();

        let orphaned = tasks.fail_orphaned("restarted").unwrap();
        assert_eq!(orphaned, vec!["pending".to_string()]);

        let recovered = tasks.get("pending").unwrap().unwrap();
        assert_eq!(recovered.status, TaskStatus::Error);
        assert_eq!(recovered.error.as_deref(), Some("restarted"));
        assert_eq!(tasks.get("done").unwrap(), Some(done));
    }
}
