//! Streaming content hash of volume files.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use sha2::{Digest, Sha256};

use super::constants::hash::CHUNK_SIZE;

/// Compute the hex-encoded SHA-256 digest of the file at `path`.
///
/// The file is read in fixed-size chunks so volumes larger than memory can
/// be hashed.
pub fn compute_file_hash(path: &Path) -> EmuliteResult<String> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            EmuliteError::NotFound(format!("{} does not exist", path.display()))
        } else {
            EmuliteError::Storage(format!("Failed to open {}: {}", path.display(), e))
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EmuliteError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    Ok(hex::encode(hasher.finalize()))
}
