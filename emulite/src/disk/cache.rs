//! Hash-keyed cache entry for the converted blobstore image.
//!
//! An entry is two sibling files in the cache directory: the qcow2 image and
//! a text file holding the hex digest of the source volume it was built from.
//! The hash file is only ever written by [`CacheEntry::commit`], which needs a
//! [`ConvertedImage`] token that only exists after a successful conversion.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use tempfile::TempPath;

use super::constants::blobstore::{HASH_FILE, QCOW_FILE, STAGING_SUFFIX};

/// Proof that a conversion finished and its output sits at the final path.
#[derive(Debug)]
pub struct ConvertedImage {
    path: PathBuf,
}

impl ConvertedImage {
    /// Move a finished staging image into place.
    pub(super) fn persist(staging: TempPath, dest: &Path) -> EmuliteResult<Self> {
        staging.persist(dest).map_err(|e| {
            EmuliteError::Storage(format!(
                "Failed to move converted image to {}: {}",
                dest.display(),
                e.error
            ))
        })?;
        Ok(Self {
            path: dest.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The cached image/hash pair inside one cache directory.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    image_path: PathBuf,
    hash_path: PathBuf,
}

impl CacheEntry {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            image_path: cache_dir.join(QCOW_FILE),
            hash_path: cache_dir.join(HASH_FILE),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn hash_path(&self) -> &Path {
        &self.hash_path
    }

    /// Where `qemu-img convert` writes before the image is moved into place.
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self.image_path.as_os_str().to_owned();
        name.push(".");
        name.push(STAGING_SUFFIX);
        PathBuf::from(name)
    }

    /// The digest recorded by the last commit, if any.
    pub fn stored_hash(&self) -> EmuliteResult<Option<String>> {
        match std::fs::read_to_string(&self.hash_path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EmuliteError::Storage(format!(
                "Failed to read hash file {}: {}",
                self.hash_path.display(),
                e
            ))),
        }
    }

    /// True when the image exists and was built from a source with `source_hash`.
    pub fn valid(&self, source_hash: &str) -> EmuliteResult<bool> {
        if !self.image_path.is_file() {
            return Ok(false);
        }
        Ok(self.stored_hash()?.as_deref() == Some(source_hash))
    }

    /// Record `source_hash` as the origin of `image`.
    pub fn commit(&self, source_hash: &str, image: ConvertedImage) -> EmuliteResult<PathBuf> {
        if image.path() != self.image_path {
            return Err(EmuliteError::Internal(format!(
                "Converted image {} does not belong to cache entry {}",
                image.path().display(),
                self.image_path.display()
            )));
        }

        std::fs::write(&self.hash_path, source_hash).map_err(|e| {
            EmuliteError::Storage(format!(
                "Failed to write hash file {}: {}",
                self.hash_path.display(),
                e
            ))
        })?;

        tracing::debug!(
            hash = %source_hash,
            image = %self.image_path.display(),
            "Committed blobstore cache entry"
        );
        Ok(image.path)
    }
}
