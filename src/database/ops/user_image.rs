use anyhow::Result;
use redb::Database;
use std::sync::Arc;

use super::{read_list, update_list};
use crate::database::schema::user_image::{USER_IMAGE_TABLE, UserImage};

/// Uploads grouped by the caller token that made them.
pub trait UserImageIndex: Send + Sync {
    fn get(&self, token: &str) -> Result<Vec<UserImage>>;

    /// Add `image` to the token's list, replacing an entry with the same id.
    fn append(&self, token: &str, image: UserImage) -> Result<()>;
}

pub struct UserImageTable {
    db: Arc<Database>,
}

impl UserImageTable {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl UserImageIndex for UserImageTable {
    fn get(&self, token: &str) -> Result<Vec<UserImage>> {
        read_list(&self.db, USER_IMAGE_TABLE, token)
    }

    fn append(&self, token: &str, image: UserImage) -> Result<()> {
        update_list(&self.db, USER_IMAGE_TABLE, token, |list: &mut Vec<UserImage>| {
            match list.iter_mut().find(|existing| existing.id == image.id) {
                Some(existing) => *existing = image,
                None => list.push(image),
            }
        })
    }
}
