use redb::TableDefinition;
use serde::{Deserialize, Serialize};

// Key: original image reference, Value: bitcode-encoded Vec<ResizeEntry>
pub const RESIZE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("resize");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct ResizeEntry {
    pub resized_file_name: String,
    pub resized_file_path: String,
    pub width: u32,
}
