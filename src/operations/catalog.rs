use anyhow::{Context, Result};
use log::info;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use crate::common::errors::ServiceError;
use crate::database::ops::image::ImageIndex;
use crate::database::ops::resize::ResizeIndex;
use crate::database::ops::user_image::UserImageIndex;
use crate::database::schema::image::ImageRecord;
use crate::database::schema::user_image::{UserImage, UserImageWithResizes};
use crate::storage::blob::BlobStore;
use crate::utils::{now_ms, validate_image_name};

/// Upload side of the service: stores originals and lists them per caller token.
pub struct Catalog {
    blobs: Arc<dyn BlobStore>,
    images: Arc<dyn ImageIndex>,
    resizes: Arc<dyn ResizeIndex>,
    user_images: Arc<dyn UserImageIndex>,
}

impl Catalog {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        images: Arc<dyn ImageIndex>,
        resizes: Arc<dyn ResizeIndex>,
        user_images: Arc<dyn UserImageIndex>,
    ) -> Self {
        Self {
            blobs,
            images,
            resizes,
            user_images,
        }
    }

    /// Publish an original and register it in the image catalog.
    ///
    /// The file name becomes the image reference; uploading the same name
    /// again replaces the stored original and its entry in the token's list.
    pub fn upload(&self, token: &str, name: &str, bytes: &[u8]) -> Result<String, ServiceError> {
        validate_image_name(name)?;
        let start_time = Instant::now();

        let location = self
            .blobs
            .publish(name, &mut Cursor::new(bytes))
            .context(format!("failed to publish upload {}", name))?;

        self.images.put(&ImageRecord {
            id: name.to_string(),
            file_name: name.to_string(),
            file_path: location.clone(),
            uploaded_at: now_ms(),
        })?;

        self.user_images.append(
            token,
            UserImage {
                id: name.to_string(),
                original_file_name: name.to_string(),
                original_file_path: location.clone(),
            },
        )?;

        info!(
            duration = &*format!("{:?}", start_time.elapsed());
            "Stored upload {} ({} bytes)", name, bytes.len()
        );
        Ok(location)
    }

    /// Catalog record of an uploaded original.
    pub fn image(&self, image_reference: &str) -> Result<Option<ImageRecord>> {
        self.images.get(image_reference)
    }

    /// Every upload made with `token`, with the resizes produced from each.
    pub fn files(&self, token: &str) -> Result<Vec<UserImageWithResizes>> {
        self.user_images
            .get(token)?
            .into_iter()
            .map(|image| -> Result<UserImageWithResizes> {
                let resized = self.resizes.get(&image.id)?;
                Ok(UserImageWithResizes { image, resized })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ops::Stores;
    use crate::database::open_in_memory;
    use crate::database::schema::resize::ResizeEntry;
    use crate::storage::blob::LocalBlobStore;
    use tempfile::TempDir;

    fn catalog(temp_dir: &TempDir) -> (Catalog, Stores) {
        let stores = Stores::new(open_in_memory().unwrap());
        let blobs = Arc::new(LocalBlobStore::new(temp_dir.path(), "/blobs").unwrap());
        let catalog = Catalog::new(
            blobs,
            stores.images.clone(),
            stores.resizes.clone(),
            stores.user_images.clone(),
        );
        (catalog, stores)
    }

    #[test]
    fn upload_registers_image_for_token() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, stores) = catalog(&temp_dir);

        let location = catalog.upload("alice", "cat.png", b"png").unwrap();
        let record = stores.images.get("cat.png").unwrap().unwrap();
        assert_eq!(record.file_path, location);

        stores
            .resizes
            .append(
                "cat.png",
                ResizeEntry {
                    resized_file_name: "thumb10.cat.png".into(),
                    resized_file_path: "/blobs/00/thumb10.cat.png".into(),
                    width: 10,
                },
            )
            .unwrap();

        let files = catalog.files("alice").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].image.original_file_path, location);
        assert_eq!(files[0].resized.len(), 1);
        assert!(catalog.files("bob").unwrap().is_empty());
    }

    #[test]
    fn reupload_keeps_one_entry_per_name() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, _stores) = catalog(&temp_dir);

        catalog.upload("alice", "cat.png", b"first").unwrap();
        let location = catalog.upload("alice", "cat.png", b"second").unwrap();
        catalog.upload("alice", "dog.png", b"dog").unwrap();

        let files = catalog.files("alice").unwrap();
        let ids: Vec<&str> = files.iter().map(|file| file.image.id.as_str()).collect();
        assert_eq!(ids, ["cat.png", "dog.png"]);
        assert_eq!(files[0].image.original_file_path, location);
        assert_eq!(catalog.image("cat.png").unwrap().unwrap().file_path, location);
        assert!(catalog.image("bird.png").unwrap().is_none());
    }

    #[test]
    fn unsupported_upload_is_rejected_before_storage() {
        let temp_dir = TempDir::new().unwrap();
        let (catalog, stores) = catalog(&temp_dir);

        let err = catalog.upload("alice", "scan.bmp", b"BM").unwrap_err();
        assert!(err.is_validation());
        assert!(stores.images.get("scan.bmp").unwrap().is_none());
        assert!(catalog.files("alice").unwrap().is_empty());
    }
}
