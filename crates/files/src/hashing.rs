//! Streaming SHA-256 digests.

use crate::constants::READ_BUFFER_LEN;
use crate::{FilesError, FilesResult};
use aip_types::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

/// Computes the SHA-256 digest and byte size of a file without loading it into memory.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> FilesResult<(u64, Sha256Digest)> {
    let file = fs::File::open(path).map_err(|e| {
        FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;

    let mut reader = BufReader::with_capacity(READ_BUFFER_LEN, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_LEN];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((total, finish(hasher)))
}

/// Computes the SHA-256 digest of an in-memory buffer.
pub fn sha256_bytes(bytes: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    finish(hasher)
}

fn finish(hasher: Sha256) -> Sha256Digest {
    let hash_array: [u8; 32] = hasher.finalize().into();
    Sha256Digest::from_bytes(&hash_array)
}
