use arrayvec::ArrayString;
use std::sync::Arc;
use uuid::Uuid;

use crate::storage::staging::FileStaging;

pub type TaskId = ArrayString<36>;

/// Unit of work carried through the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeRequest {
    pub task_id: TaskId,
    pub image_reference: String,
    pub width: u32,
    pub submitted_at: i64,
}

pub fn new_task_id() -> TaskId {
    let mut buffer = Uuid::encode_buffer();
    let hyphenated = Uuid::new_v4().hyphenated().encode_lower(&mut buffer);
    // A hyphenated uuid is exactly 36 ASCII bytes
    let mut id = TaskId::new();
    id.push_str(hyphenated);
    id
}

// ────────────────────────────────────────────────────────────────
// ScratchGuard - Clears the staging area however a run ends
// ────────────────────────────────────────────────────────────────

pub struct ScratchGuard(Arc<dyn FileStaging>);

impl ScratchGuard {
    pub fn new(staging: Arc<dyn FileStaging>) -> Self {
        Self(staging)
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.0.clear();
    }
}
