use redb::TableDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

// Key: task id, Value: bitcode-encoded TaskRecord
pub const TASK_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("task");

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Done,
    Error,
}

impl TaskStatus {
    /// Done and Error never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// Names and locations resolved by a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub source_file_name: String,
    pub source_file_path: String,
    pub resized_file_name: String,
    pub resized_file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub status: TaskStatus,
    pub image_reference: String,
    pub width: u32,
    pub source_file_name: Option<String>,
    pub source_file_path: Option<String>,
    pub resized_file_name: Option<String>,
    pub resized_file_path: Option<String>,
    pub error: Option<String>,
    pub submitted_at: i64,
    pub finished_at: Option<i64>,
}

impl TaskRecord {
    pub fn in_progress(image_reference: impl Into<String>, width: u32, submitted_at: i64) -> Self {
        Self {
            status: TaskStatus::InProgress,
            image_reference: image_reference.into(),
            width,
            source_file_name: None,
            source_file_path: None,
            resized_file_name: None,
            resized_file_path: None,
            error: None,
            submitted_at,
            finished_at: None,
        }
    }

    pub fn into_done(self, files: ResolvedFiles, finished_at: i64) -> Self {
        Self {
            status: TaskStatus::Done,
            source_file_name: Some(files.source_file_name),
            source_file_path: Some(files.source_file_path),
            resized_file_name: Some(files.resized_file_name),
            resized_file_path: Some(files.resized_file_path),
            error: None,
            finished_at: Some(finished_at),
            ..self
        }
    }

    /// Failed runs never carry resolved file fields, even partially.
    pub fn into_failed(self, error: impl Into<String>, finished_at: i64) -> Self {
        Self {
            status: TaskStatus::Error,
            source_file_name: None,
            source_file_path: None,
            resized_file_name: None,
            resized_file_path: None,
            error: Some(error.into()),
            finished_at: Some(finished_at),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> ResolvedFiles {
        ResolvedFiles {
            source_file_name: "cat.png".into(),
            source_file_path: "/blobs/ab/cat.png".into(),
            resized_file_name: "thumb100.cat.png".into(),
            resized_file_path: "/blobs/cd/thumb100.cat.png".into(),
        }
    }

    #[test]
    fn done_fills_every_file_field() {
        let record = TaskRecord::in_progress("cat.png", 100, 1).into_done(files(), 2);
        assert_eq!(record.status, TaskStatus::Done);
        assert_eq!(record.source_file_path.as_deref(), Some("/blobs/ab/cat.png"));
        assert_eq!(record.resized_file_name.as_deref(), Some("thumb100.cat.png"));
        assert_eq!(record.submitted_at, 1);
        assert_eq!(record.finished_at, Some(2));
        assert!(record.error.is_none());
    }

    #[test]
    fn failed_clears_file_fields() {
        let record = TaskRecord::in_progress("cat.png", 100, 1)
            .into_done(files(), 2)
            .into_failed("boom", 3);
        assert_eq!(record.status, TaskStatus::Error);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!(record.source_file_path.is_none());
        assert!(record.resized_file_path.is_none());
    }

    #[test]
    fn record_survives_bitcode() {
        let record = TaskRecord::in_progress("cat.png", 64, 10);
        let bytes = bitcode::encode(&record);
        let decoded: TaskRecord = bitcode::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }
}
