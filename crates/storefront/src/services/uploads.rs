//! Product image storage on the local filesystem.
//!
//! Images are written under the configured upload directory with a random
//! prefix, so two uploads named `photo.png` never overwrite each other. Only
//! the stored filename is persisted on the product row.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Maximum length of the sanitized original name kept in the stored filename.
const MAX_NAME_LENGTH: usize = 64;

/// Errors from storing an uploaded image.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file extension is not in the allow-list.
    #[error("only {allowed} images are allowed")]
    ExtensionNotAllowed { allowed: String },

    /// The filename has no usable characters or no extension.
    #[error("invalid file name")]
    InvalidFilename,

    /// The file exceeds the configured size limit.
    #[error("file is larger than {max} bytes")]
    TooLarge { max: usize },

    /// Writing the file failed.
    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores product images in a directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_bytes: usize,
}

impl ImageStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            max_bytes: config.max_bytes,
        }
    }

    /// Directory images are stored in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check an original filename against the allow-list.
    ///
    /// Returns the sanitized name that [`ImageStore::save`] will use.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidFilename` or
    /// `UploadError::ExtensionNotAllowed`.
    pub fn check_filename(&self, original_name: &str) -> Result<String, UploadError> {
        let name = sanitize_filename(original_name)
            .map(|name| truncate_keeping_extension(&name))
            .ok_or(UploadError::InvalidFilename)?;

        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| self.extension_not_allowed())?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(self.extension_not_allowed());
        }

        Ok(name)
    }

    /// Check an upload's name and size without writing anything.
    ///
    /// Returns the sanitized name that [`ImageStore::save`] will use.
    ///
    /// # Errors
    ///
    /// Returns the `check_filename` errors or `UploadError::TooLarge`.
    pub fn check(&self, original_name: &str, size: usize) -> Result<String, UploadError> {
        let name = self.check_filename(original_name)?;

        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                max: self.max_bytes,
            });
        }

        Ok(name)
    }

    /// Write an image and return its stored filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is rejected, the file is too large, or
    /// the write fails.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let name = self.check(original_name, bytes.len())?;

        let stored = format!("{}_{name}", Uuid::new_v4().simple());

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&stored), bytes).await?;

        tracing::debug!(file = %stored, size = bytes.len(), "Stored product image");
        Ok(stored)
    }

    /// Remove a stored image. Failures are logged, never returned.
    pub async fn remove(&self, stored: &str) {
        if !is_stored_name(stored) {
            tracing::warn!(file = %stored, "Refusing to remove suspicious image path");
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.dir.join(stored)).await {
            tracing::warn!(file = %stored, error = %e, "Failed to remove product image");
        }
    }

    fn extension_not_allowed(&self) -> UploadError {
        UploadError::ExtensionNotAllowed {
            allowed: self.allowed_extensions.join(", "),
        }
    }
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Drops any directory components, replaces characters outside
/// `[A-Za-z0-9._-]` with `_` and strips leading dots.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    Some(cleaned.to_owned())
}

/// Whether `name` is a bare filename this store could have produced.
fn is_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Truncate long names to `MAX_NAME_LENGTH`, preserving the extension.
fn truncate_keeping_extension(name: &str) -> String {
    if name.len() <= MAX_NAME_LENGTH {
        return name.to_owned();
    }

    // ASCII-only at this point, so byte slicing is on char boundaries
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < MAX_NAME_LENGTH => {
            let keep = MAX_NAME_LENGTH - ext.len() - 1;
            format!("{}.{ext}", stem.get(..keep.min(stem.len())).unwrap_or(stem))
        }
        _ => name.get(..MAX_NAME_LENGTH).unwrap_or(name).to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ImageStore {
        ImageStore::new(&UploadConfig::in_dir(dir))
    }

    #[test]
    fn test_sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\tmp\\my photo.png").as_deref(), Some("my_photo.png"));
        assert_eq!(sanitize_filename(".hidden.jpg").as_deref(), Some("hidden.jpg"));
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_stored_name_check() {
        assert!(is_stored_name("0a1b_photo.png"));
        assert!(!is_stored_name("../photo.png"));
        assert!(!is_stored_name("dir/photo.png"));
        assert!(!is_stored_name(""));
    }

    #[test]
    fn test_long_names_keep_their_extension() {
        let long = format!("{}.png", "a".repeat(80));
        let name = truncate_keeping_extension(&long);
        assert_eq!(name.len(), MAX_NAME_LENGTH);
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_extension_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let images = store(dir.path());

        assert!(images.check_filename("photo.PNG").is_ok());
        assert!(images.check_filename("photo.jpeg").is_ok());
        assert!(matches!(
            images.check_filename("anim.gif"),
            Err(UploadError::ExtensionNotAllowed { .. })
        ));
        assert!(matches!(
            images.check_filename("script.sh"),
            Err(UploadError::ExtensionNotAllowed { .. })
        ));
        assert!(matches!(
            images.check_filename("noextension"),
            Err(UploadError::ExtensionNotAllowed { .. })
        ));
    }

    #[test]
    fn test_gif_can_be_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UploadConfig::in_dir(dir.path());
        config.allowed_extensions.push("gif".to_owned());
        assert!(ImageStore::new(&config).check_filename("anim.gif").is_ok());
    }

    #[tokio::test]
    async fn test_identical_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let images = store(dir.path());

        let first = images.save("photo.png", b"one").await.unwrap();
        let second = images.save("photo.png", b"two").await.unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with("_photo.png"));

        assert_eq!(tokio::fs::read(dir.path().join(&first)).await.unwrap(), b"one");
        assert_eq!(tokio::fs::read(dir.path().join(&second)).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_too_large_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UploadConfig::in_dir(dir.path());
        config.max_bytes = 4;
        let images = ImageStore::new(&config);

        let err = images.save("photo.png", b"12345").await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { max: 4 }));

        assert!(matches!(
            images.check("photo.png", 5),
            Err(UploadError::TooLarge { max: 4 })
        ));
        assert_eq!(images.check("photo.png", 4).unwrap(), "photo.png");
    }

    #[tokio::test]
    async fn test_remove_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let images = store(dir.path());

        let stored = images.save("photo.png", b"img").await.unwrap();
        images.remove(&stored).await;
        assert!(!dir.path().join(&stored).exists());

        // Missing files and traversal attempts are ignored
        images.remove(&stored).await;
        images.remove("../outside.png").await;
    }
}
