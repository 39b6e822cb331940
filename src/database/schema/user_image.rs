use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::database::schema::resize::ResizeEntry;

// Key: caller token, Value: bitcode-encoded Vec<UserImage>
pub const USER_IMAGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("user_image");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct UserImage {
    pub id: String,
    pub original_file_name: String,
    pub original_file_path: String,
}

/// An upload together with every resize produced from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserImageWithResizes {
    #[serde(flatten)]
    pub image: UserImage,
    pub resized: Vec<ResizeEntry>,
}
