use redb::TableDefinition;
use serde::{Deserialize, Serialize};

// Key: image reference (the uploaded file name), Value: bitcode-encoded ImageRecord
pub const IMAGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("image");

/// Catalog entry for an uploaded original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub uploaded_at: i64,
}
