//! Extended, qcow2-converted copy of the blobstore volume.
//!
//! The guest cannot grow its FVM volume at runtime, so the volume is extended
//! before boot. `fvm` only extends in place, so the work happens on a private
//! temporary copy and the source volume is never modified. The result is kept
//! in the output directory and reused for as long as the source hash matches.

use std::path::{Path, PathBuf};

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use tempfile::TempPath;

use super::cache::{CacheEntry, ConvertedImage};
use super::constants::blobstore::{EXTENDED_SIZE_BYTES, GEN_DIR};
use super::hash::compute_file_hash;
use super::lock::CacheLock;
use super::tools::VolumeTools;

/// Produces and caches the extended qcow2 image for one output directory.
pub struct BlobstoreCache<'a> {
    cache_dir: PathBuf,
    tools: &'a dyn VolumeTools,
    extended_size: u64,
}

impl<'a> BlobstoreCache<'a> {
    /// Cache rooted at `<output_dir>/gen`.
    pub fn new(output_dir: &Path, tools: &'a dyn VolumeTools) -> Self {
        Self {
            cache_dir: output_dir.join(GEN_DIR),
            tools,
            extended_size: EXTENDED_SIZE_BYTES,
        }
    }

    /// Override the capacity the volume is extended to.
    pub fn with_extended_size(mut self, bytes: u64) -> Self {
        self.extended_size = bytes;
        self
    }

    pub fn entry(&self) -> CacheEntry {
        CacheEntry::new(&self.cache_dir)
    }

    /// Return the path of an extended qcow2 image matching `source`.
    ///
    /// Reuses the cached image when the stored hash matches; otherwise copies,
    /// extends and converts the volume, and records the new hash only once the
    /// conversion succeeded.
    pub fn ensure(&self, source: &Path) -> EmuliteResult<PathBuf> {
        if !source.is_file() {
            return Err(EmuliteError::NotFound(format!(
                "blobstore volume {} does not exist",
                source.display()
            )));
        }

        let _lock = CacheLock::acquire(&self.cache_dir)?;
        let entry = self.entry();

        let source_hash = compute_file_hash(source)?;
        if entry.valid(&source_hash)? {
            tracing::info!(
                image = %entry.image_path().display(),
                "Reusing cached blobstore image"
            );
            return Ok(entry.image_path().to_path_buf());
        }

        tracing::info!(
            source = %source.display(),
            size = self.extended_size,
            "Building extended blobstore image"
        );

        let scratch = self.copy_to_scratch(source)?;
        self.tools.extend(&scratch, self.extended_size, source)?;

        let staging = TempPath::try_from_path(entry.staging_path()).map_err(|e| {
            EmuliteError::Storage(format!(
                "Failed to stage converted image {}: {}",
                entry.staging_path().display(),
                e
            ))
        })?;
        self.tools.convert_to_qcow2(&scratch, &staging)?;
        let image = ConvertedImage::persist(staging, entry.image_path())?;

        let path = entry.commit(&source_hash, image)?;
        tracing::info!(image = %path.display(), "Blobstore image ready");
        Ok(path)
    }

    /// Copy `source` into a temporary file that is deleted when dropped.
    fn copy_to_scratch(&self, source: &Path) -> EmuliteResult<TempPath> {
        let scratch = tempfile::Builder::new()
            .prefix("blobstore-")
            .suffix(".blk")
            .tempfile()
            .map_err(|e| {
                EmuliteError::Storage(format!("Failed to create temporary volume: {}", e))
            })?
            .into_temp_path();

        std::fs::copy(source, &scratch).map_err(|e| {
            EmuliteError::Storage(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                scratch.display(),
                e
            ))
        })?;

        tracing::debug!(scratch = %scratch.display(), "Copied blobstore to scratch volume");
        Ok(scratch)
    }
}

/// Convenience wrapper: `BlobstoreCache::new(output_dir, tools).ensure(source)`.
pub fn ensure_extended_volume(
    source: &Path,
    output_dir: &Path,
    tools: &dyn VolumeTools,
) -> EmuliteResult<PathBuf> {
    BlobstoreCache::new(output_dir, tools).ensure(source)
}
