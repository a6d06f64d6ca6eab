//! AIP File Handling
//!
//! This crate owns every byte-level operation the package builder and validator perform on
//! content files:
//!
//! - Placing source files into a package's data directory with collision-safe naming
//! - Streaming SHA-256 digests
//! - Best-effort media type detection from file headers
//! - Content probing (size, digest, page count, encryption and text markers)
//!
//! ## Placement Model
//!
//! A package's data directory holds one physical file per item:
//!
//! ```text
//! representations/rep1/data/
//! ├── CODE123.1.pdf
//! ├── CODE123.2.pdf
//! └── CODE123.2_001.pdf    # different bytes, same source name
//! ```
//!
//! - A name that is free is used as-is
//! - A name that is taken by identical bytes is reused (deduplicated)
//! - A name that is taken by different bytes gets a `_NNN` suffix before the extension
//!
//! No item ever ends up pointing at a file that holds another item's bytes.
//!
//! ## Example Usage
//!
//! ```no_run
//! use aip_files::{ContentInspector, DataDirectory, PdfInspector};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = DataDirectory::new(Path::new("out/pkg/representations/rep1/data"))?;
//! let placed = data.place(Path::new("pool/hoso01/CODE123.1.pdf"))?;
//! let report = PdfInspector.inspect(&data.path().join(&placed.filename));
//! println!("{} pages", report.page_count.unwrap_or(0));
//! # Ok(())
//! # }
//! ```

mod constants;
mod hashing;
mod media;
mod inspect;
mod store;

pub use constants::{MAX_DISAMBIGUATION_ATTEMPTS, PDF_MAGIC, SNIFF_LEN};
pub use hashing::{sha256_bytes, sha256_file};
pub use media::{detect_media_type, has_recognised_header, read_header};
pub use inspect::{ContentInspector, InspectionReport, PdfInspector};
pub use store::{DataDirectory, PlacedFile};

pub use aip_types::Sha256Digest;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Target directory does not exist or is not a directory
    #[error("Invalid directory: {0}")]
    InvalidDirectory(String),

    /// Source file does not exist
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    /// Path has no usable file name component
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Every suffixed candidate name was already taken by different content
    #[error("No free file name for {0} after {1} attempts")]
    NameExhausted(String, u32),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file operations.
pub type FilesResult<T> = Result<T, FilesError>;
