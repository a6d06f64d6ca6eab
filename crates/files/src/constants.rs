//! Constants used by the file handling crate.

/// Highest numeric suffix tried when disambiguating a colliding file name (`_001` to `_999`).
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 999;

/// Number of leading bytes read for header-based media type detection.
pub const SNIFF_LEN: usize = 8192;

/// Leading bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Buffer size for streaming reads.
pub(crate) const READ_BUFFER_LEN: usize = 64 * 1024;
