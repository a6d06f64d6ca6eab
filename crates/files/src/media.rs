//! Header-based media type detection.
//!
//! Detection is best-effort and relies on the `infer` matchers. A file whose first bytes are not
//! recognised is reported as `None`, which the validator treats as an unrecognised header.

use crate::constants::{PDF_MAGIC, SNIFF_LEN};
use crate::{FilesError, FilesResult};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Reads up to [`SNIFF_LEN`] leading bytes of a file.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if the file cannot be opened or read.
pub fn read_header(path: &Path) -> FilesResult<Vec<u8>> {
    let file = fs::File::open(path).map_err(|e| {
        FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;

    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Detects the media (MIME) type of a file from its header bytes.
///
/// # Returns
///
/// `Some(mime)` when a matcher recognises the header, otherwise `None`.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if the file cannot be read.
pub fn detect_media_type(path: &Path) -> FilesResult<Option<&'static str>> {
    let header = read_header(path)?;
    Ok(infer::get(&header).map(|kind| kind.mime_type()))
}

/// Returns true when the header bytes identify a known file type.
///
/// PDFs are accepted on the `%PDF-` signature even when `infer` would not classify the
/// remainder of the buffer.
pub fn has_recognised_header(header: &[u8]) -> bool {
    header.starts_with(PDF_MAGIC) || infer::get(header).is_some()
}
