//! Storage and disk image constants.
//!
//! Centralized location for all storage-related configuration values.

/// Blobstore volume cache configuration
pub mod blobstore {
    /// Capacity the blobstore volume is extended to before conversion (1 GiB).
    ///
    /// Must be at least the current volume size, otherwise `fvm extend` fails.
    pub const EXTENDED_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

    /// Name of the source volume inside the SDK images directory
    pub const SOURCE_FILE: &str = "storage-full.blk";

    /// Subdirectory of the output directory holding generated files
    pub const GEN_DIR: &str = "gen";

    /// Converted, extended qcow2 image
    pub const QCOW_FILE: &str = "blobstore.qcow";

    /// Hex digest of the source volume the qcow2 image was built from
    pub const HASH_FILE: &str = "blobstore.hash";

    /// Advisory lock serializing cache updates
    pub const LOCK_FILE: &str = "blobstore.lock";

    /// Suffix for the image while `qemu-img convert` is writing it
    pub const STAGING_SUFFIX: &str = "partial";
}

/// Content hashing configuration
pub mod hash {
    /// Read size used when streaming a file through the digest
    pub const CHUNK_SIZE: usize = 4096;
}
