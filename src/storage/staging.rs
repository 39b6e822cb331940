use anyhow::{Context, Result, bail};
use log::warn;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::background::processors::image::resize_to_width;
use crate::common::THUMB_PREFIX;
use crate::utils::validate_image_name;

/// A file placed in the scratch area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub path: PathBuf,
}

/// Scratch area where originals are placed and resized before publishing.
pub trait FileStaging: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<StagedFile>;

    /// Produce `thumb<width>.<name>` next to `source`.
    fn resize(&self, source: &StagedFile, width: u32) -> Result<StagedFile>;

    fn open_for_upload(&self, file: &StagedFile) -> Result<Box<dyn Read + Send>>;

    /// Remove every file staged so far. Missing files are ignored.
    fn clear(&self);
}

pub struct ScratchDir {
    root: PathBuf,
    staged: Mutex<Vec<PathBuf>>,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).context(format!("failed to create scratch dir {:?}", root))?;
        Ok(Self {
            root,
            staged: Mutex::new(Vec::new()),
        })
    }

    fn track(&self, path: PathBuf) {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }
}

impl FileStaging for ScratchDir {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<StagedFile> {
        validate_image_name(name)?;
        let path = self.root.join(name);
        self.track(path.clone());
        fs::write(&path, bytes).context(format!("failed to stage {:?}", path))?;
        Ok(StagedFile {
            name: name.to_string(),
            path,
        })
    }

    fn resize(&self, source: &StagedFile, width: u32) -> Result<StagedFile> {
        validate_image_name(&source.name)?;
        if !source.path.is_file() {
            bail!("staged file {:?} does not exist", source.path);
        }
        let name = format!("{}{}.{}", THUMB_PREFIX, width, source.name);
        let path = self.root.join(&name);
        self.track(path.clone());
        resize_to_width(&source.path, &path, width)?;
        Ok(StagedFile { name, path })
    }

    fn open_for_upload(&self, file: &StagedFile) -> Result<Box<dyn Read + Send>> {
        let handle = File::open(&file.path).context(format!("failed to open {:?}", file.path))?;
        Ok(Box::new(handle))
    }

    fn clear(&self) {
        let staged = std::mem::take(&mut *self.staged.lock().unwrap_or_else(PoisonError::into_inner));
        for path in staged {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("Failed to remove staged file {:?}: {}", path, err),
            }
        }
    }
}
