use std::path::Path;

use crate::common::VALID_IMAGE_EXTENSIONS;
use crate::common::errors::ServiceError;

pub trait PathExt {
    fn ext_lower(&self) -> String;
}

impl PathExt for Path {
    fn ext_lower(&self) -> String {
        self.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

pub fn is_supported_image(name: impl AsRef<str>) -> bool {
    let ext = Path::new(name.as_ref()).ext_lower();
    VALID_IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Check that `name` is a flat file name with an allow-listed extension.
///
/// Image references double as blob keys and scratch file names, so anything
/// that could escape a directory is rejected.
pub fn validate_image_name(name: &str) -> Result<(), ServiceError> {
    let is_flat = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if !is_flat {
        return Err(ServiceError::InvalidName(name.to_string()));
    }
    if !is_supported_image(name) {
        let ext = Path::new(name).ext_lower();
        let shown = if ext.is_empty() {
            name.to_string()
        } else {
            format!(".{}", ext)
        };
        return Err(ServiceError::UnsupportedExtension(shown));
    }
    Ok(())
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
