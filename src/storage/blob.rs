use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;
use uuid::Uuid;

/// Name-addressable object storage for originals and resized variants.
pub trait BlobStore: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>>;

    /// Store `body` under `name`, returning the location the blob is reachable at.
    fn publish(&self, name: &str, body: &mut dyn Read) -> Result<String>;
}

/// Blob store backed by a local directory.
///
/// Objects live at `<root>/<shard>/<name>`, where the shard is the first two
/// hex digits of the blake3 hash of the name. Locations are returned as
/// `<public_prefix>/<shard>/<name>`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).context(format!("failed to create blob root {:?}", root))?;
        Ok(Self {
            root,
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        })
    }

    fn shard(name: &str) -> String {
        blake3::hash(name.as_bytes()).to_hex()[0..2].to_string()
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf> {
        ensure_flat_name(name)?;
        Ok(self.root.join(Self::shard(name)).join(name))
    }

    fn location(&self, name: &str) -> String {
        format!("{}/{}/{}", self.public_prefix, Self::shard(name), name)
    }
}

impl BlobStore for LocalBlobStore {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(reference)?;
        fs::read(&path).context(format!("failed to read blob {:?}", path))
    }

    fn publish(&self, name: &str, body: &mut dyn Read) -> Result<String> {
        let path = self.blob_path(name)?;
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("failed to determine parent directory of {:?}", path))?;
        fs::create_dir_all(parent)
            .context(format!("failed to create directory tree {:?}", parent))?;

        // Write next to the target and rename so readers never see a partial blob
        let partial = path.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4()));
        let mut file =
            File::create(&partial).context(format!("failed to create {:?}", partial))?;
        io::copy(body, &mut file).context(format!("failed to write blob {:?}", partial))?;
        file.sync_all()
            .context(format!("failed to flush blob {:?}", partial))?;
        fs::rename(&partial, &path)
            .context(format!("failed to move {:?} to {:?}", partial, path))?;

        Ok(self.location(name))
    }
}

fn ensure_flat_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(anyhow!("invalid blob name {:?}", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn publish_then_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(temp_dir.path(), "/blobs/").unwrap();

        let location = blobs
            .publish("cat.png", &mut Cursor::new(b"meow".to_vec()))
            .unwrap();
        assert!(location.starts_with("/blobs/"));
        assert!(location.ends_with("/cat.png"));
        assert_eq!(location.split('/').count(), 4);

        assert_eq!(blobs.fetch("cat.png").unwrap(), b"meow".to_vec());
    }

    #[test]
    fn republish_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(temp_dir.path(), "/blobs").unwrap();
        blobs.publish("a.gif", &mut Cursor::new(b"one".to_vec())).unwrap();
        blobs.publish("a.gif", &mut Cursor::new(b"two".to_vec())).unwrap();
        assert_eq!(blobs.fetch("a.gif").unwrap(), b"two".to_vec());
    }

    #[test]
    fn missing_blob_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(temp_dir.path(), "/blobs").unwrap();
        let err = blobs.fetch("missing.jpg").unwrap_err();
        assert!(format!("{:#}", err).contains("missing.jpg"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(temp_dir.path(), "/blobs").unwrap();
        assert!(blobs.fetch("../secret.png").is_err());
        assert!(
            blobs
                .publish("..", &mut Cursor::new(Vec::new()))
                .is_err()
        );
    }
}
