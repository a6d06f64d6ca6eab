//! Collision-safe placement of content files into a package data directory.
//!
//! # Naming
//!
//! Given a source file `CODE123.2.pdf`:
//!
//! 1. If `data/CODE123.2.pdf` does not exist, the source is copied there.
//! 2. If it exists with the same size and digest, nothing is copied and the existing file is
//!    reused.
//! 3. Otherwise `data/CODE123.2_001.pdf`, `data/CODE123.2_002.pdf`, ... are tried in turn with
//!    the same rules, up to [`MAX_DISAMBIGUATION_ATTEMPTS`].
//!
//! Size is compared first and the digest only when sizes match, so the common case of a free
//! name costs one hash of the copied file.

use crate::constants::MAX_DISAMBIGUATION_ATTEMPTS;
use crate::hashing::sha256_file;
use crate::{FilesError, FilesResult};
use aip_types::Sha256Digest;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of placing one source file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlacedFile {
    /// File name inside the data directory (may carry a `_NNN` suffix)
    pub filename: String,

    /// Size of the placed file in bytes
    pub size_bytes: u64,

    /// Digest of the placed file
    pub sha256: Sha256Digest,

    /// True when an identical file was already present and nothing was copied
    pub deduplicated: bool,
}

/// A package data directory that content files are placed into.
#[derive(Debug)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    /// Creates a handle for an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidDirectory`] if `root` does not exist or is not a directory.
    pub fn new(root: &Path) -> FilesResult<Self> {
        if !root.exists() {
            return Err(FilesError::InvalidDirectory(format!(
                "Directory does not exist: {}",
                root.display()
            )));
        }

        if !root.is_dir() {
            return Err(FilesError::InvalidDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Copies `source` into the directory, disambiguating the name on collision.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The source does not exist or is not a file
    /// - The source has no file name
    /// - All suffixed names are taken by different content
    /// - Reading, hashing or copying fails (I/O)
    pub fn place(&self, source: &Path) -> FilesResult<PlacedFile> {
        if !source.is_file() {
            return Err(FilesError::SourceNotFound(source.display().to_string()));
        }

        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FilesError::InvalidPath(source.display().to_string()))?;

        let source_size = fs::metadata(source)?.len();
        let mut source_digest: Option<Sha256Digest> = None;

        for attempt in 0..=MAX_DISAMBIGUATION_ATTEMPTS {
            let candidate = candidate_name(filename, attempt);
            let target = self.root.join(&candidate);

            if !target.exists() {
                fs::copy(source, &target).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to copy {} to {}: {}",
                            source.display(),
                            target.display(),
                            e
                        ),
                    ))
                })?;
                let (size_bytes, sha256) = sha256_file(&target)?;
                if attempt > 0 {
                    tracing::debug!(
                        source = %source.display(),
                        placed = %candidate,
                        "renamed colliding content file"
                    );
                }
                return Ok(PlacedFile {
                    filename: candidate,
                    size_bytes,
                    sha256,
                    deduplicated: false,
                });
            }

            if fs::metadata(&target)?.len() != source_size {
                continue;
            }

            let wanted = match &source_digest {
                Some(digest) => digest.clone(),
                None => {
                    let (_, digest) = sha256_file(source)?;
                    source_digest = Some(digest.clone());
                    digest
                }
            };
            let (size_bytes, existing) = sha256_file(&target)?;
            if existing == wanted {
                return Ok(PlacedFile {
                    filename: candidate,
                    size_bytes,
                    sha256: existing,
                    deduplicated: true,
                });
            }
        }

        Err(FilesError::NameExhausted(
            filename.to_owned(),
            MAX_DISAMBIGUATION_ATTEMPTS,
        ))
    }
}

/// `name.ext` for attempt 0, `name_NNN.ext` afterwards.
fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_owned();
    }
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!(
            "{}_{:03}{}",
            &filename[..dot],
            attempt,
            &filename[dot..]
        ),
        _ => format!("{}_{:03}", filename, attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let pool = temp.path().join("pool");
        let data = temp.path().join("data");
        fs::create_dir_all(&pool).unwrap();
        fs::create_dir_all(&data).unwrap();
        (temp, pool, data)
    }

    #[test]
    fn test_new_rejects_missing_directory() {
        let temp = TempDir::new().unwrap();
        let result = DataDirectory::new(&temp.path().join("nope"));

        assert!(matches!(result, Err(FilesError::InvalidDirectory(_))));
    }

    #[test]
    fn test_new_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, b"x").unwrap();

        assert!(DataDirectory::new(&file).is_err());
    }

    #[test]
    fn test_place_copies_under_original_name() {
        let (_temp, pool, data) = setup();
        let source = pool.join("CODE123.1.pdf");
        fs::write(&source, b"%PDF-1.4 one").unwrap();

        let dir = DataDirectory::new(&data).unwrap();
        let placed = dir.place(&source).unwrap();

        assert_eq!(placed.filename, "CODE123.1.pdf");
        assert_eq!(placed.size_bytes, 12);
        assert!(!placed.deduplicated);
        assert_eq!(fs::read(data.join("CODE123.1.pdf")).unwrap(), b"%PDF-1.4 one");
    }

    #[test]
    fn test_place_identical_content_is_deduplicated() {
        let (_temp, pool, data) = setup();
        let source = pool.join("A.1.pdf");
        fs::write(&source, b"%PDF-same").unwrap();
        fs::write(data.join("A.1.pdf"), b"%PDF-same").unwrap();

        let placed = DataDirectory::new(&data).unwrap().place(&source).unwrap();

        assert_eq!(placed.filename, "A.1.pdf");
        assert!(placed.deduplicated);
        assert_eq!(fs::read_dir(&data).unwrap().count(), 1);
    }

    #[test]
    fn test_place_different_size_gets_suffix() {
        let (_temp, pool, data) = setup();
        let source = pool.join("A.1.pdf");
        fs::write(&source, b"%PDF-new and longer").unwrap();
        fs::write(data.join("A.1.pdf"), b"%PDF-old").unwrap();

        let placed = DataDirectory::new(&data).unwrap().place(&source).unwrap();

        assert_eq!(placed.filename, "A.1_001.pdf");
        assert_eq!(fs::read(data.join("A.1.pdf")).unwrap(), b"%PDF-old");
        assert_eq!(
            fs::read(data.join("A.1_001.pdf")).unwrap(),
            b"%PDF-new and longer"
        );
    }

    #[test]
    fn test_place_same_size_different_bytes_gets_suffix() {
        let (_temp, pool, data) = setup();
        let source = pool.join("A.1.pdf");
        fs::write(&source, b"%PDF-bbbb").unwrap();
        fs::write(data.join("A.1.pdf"), b"%PDF-aaaa").unwrap();

        let placed = DataDirectory::new(&data).unwrap().place(&source).unwrap();

        assert_eq!(placed.filename, "A.1_001.pdf");
        assert!(!placed.deduplicated);
    }

    #[test]
    fn test_place_skips_taken_suffixes() {
        let (_temp, pool, data) = setup();
        let source = pool.join("A.1.pdf");
        fs::write(&source, b"%PDF-third").unwrap();
        fs::write(data.join("A.1.pdf"), b"%PDF-1").unwrap();
        fs::write(data.join("A.1_001.pdf"), b"%PDF-22").unwrap();

        let placed = DataDirectory::new(&data).unwrap().place(&source).unwrap();

        assert_eq!(placed.filename, "A.1_002.pdf");
    }

    #[test]
    fn test_place_missing_source() {
        let (_temp, pool, data) = setup();
        let result = DataDirectory::new(&data)
            .unwrap()
            .place(&pool.join("missing.pdf"));

        assert!(matches!(result, Err(FilesError::SourceNotFound(_))));
    }

    #[test]
    fn test_candidate_name_without_extension() {
        assert_eq!(candidate_name("README", 3), "README_003");
        assert_eq!(candidate_name(".hidden", 1), ".hidden_001");
        assert_eq!(candidate_name("a.b.pdf", 12), "a.b_012.pdf");
    }
}
