//! Disk image operations.
//!
//! This module provides the blobstore volume cache:
//! - `BlobstoreCache` - extend + convert the blobstore, reusing prior work
//! - `CacheEntry` - hash/image file pair and its validity check
//! - `VolumeTools` - the `fvm`/`qemu-img` operations the cache shells out to
//! - `CacheLock` - advisory lock serializing cache updates

pub mod constants;
mod blobstore;
mod cache;
mod hash;
mod lock;
mod tools;

pub use blobstore::{BlobstoreCache, ensure_extended_volume};
pub use cache::{CacheEntry, ConvertedImage};
pub use hash::compute_file_hash;
pub use lock::CacheLock;
pub use tools::{ExternalVolumeTools, VolumeTools, describe_command};

/// Disk image format passed to the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiskFormat {
    /// QCOW2 (QEMU Copy-On-Write v2).
    Qcow2,
}

impl DiskFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Qcow2 => "qcow2",
        }
    }
}
