//! ZIP archiving of a finished package directory.

use crate::{AipError, AipResult};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive path for a package directory: the directory path with `.zip` appended.
pub fn archive_path_for(package_dir: &Path) -> PathBuf {
    let mut name = package_dir.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

/// Write `package_dir` into a deflate-compressed ZIP next to it.
///
/// Entry names are relative to the package's parent, so extracting the archive recreates the
/// package directory itself. Entries are written in file-name order. A partially written archive
/// is removed before the error is returned.
///
/// # Returns
///
/// The archive path and its size in bytes.
pub fn create_archive(package_dir: &Path) -> AipResult<(PathBuf, u64)> {
    let archive_path = archive_path_for(package_dir);

    match write_archive(package_dir, &archive_path) {
        Ok(()) => {
            let size = fs::metadata(&archive_path)?.len();
            tracing::debug!(archive = %archive_path.display(), size, "created package archive");
            Ok((archive_path, size))
        }
        Err(e) => {
            if archive_path.exists() {
                if let Err(remove_err) = fs::remove_file(&archive_path) {
                    tracing::warn!(
                        archive = %archive_path.display(),
                        error = %remove_err,
                        "failed to remove partial archive"
                    );
                }
            }
            Err(e)
        }
    }
}

fn write_archive(package_dir: &Path, archive_path: &Path) -> AipResult<()> {
    let base = package_dir.parent().unwrap_or(package_dir);
    let file = File::create(archive_path).map_err(|source| AipError::FileWrite {
        path: archive_path.display().to_string(),
        source,
    })?;

    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for entry in WalkDir::new(package_dir).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| AipError::InvalidInput(entry.path().display().to_string()))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut source = File::open(entry.path()).map_err(|source| AipError::FileRead {
                path: entry.path().display().to_string(),
                source,
            })?;
            io::copy(&mut source, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}

/// ZIP entry names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_archive_entries_relative_to_parent() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("hoso01").join("urn_uuid_abc");
        fs::create_dir_all(package.join("representations/rep1/data")).unwrap();
        fs::write(package.join("METS.xml"), "<mets/>").unwrap();
        fs::write(package.join("representations/rep1/data/A.1.pdf"), b"%PDF-1.4").unwrap();

        let (path, size) = create_archive(&package).unwrap();
        assert_eq!(path, temp.path().join("hoso01").join("urn_uuid_abc.zip"));
        assert!(size > 0);

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        assert!(names.contains(&"urn_uuid_abc/METS.xml".to_string()));
        assert!(names.contains(&"urn_uuid_abc/representations/rep1/data/A.1.pdf".to_string()));

        let mut mets = String::new();
        archive
            .by_name("urn_uuid_abc/METS.xml")
            .unwrap()
            .read_to_string(&mut mets)
            .unwrap();
        assert_eq!(mets, "<mets/>");
    }

    #[test]
    fn test_missing_package_leaves_no_archive() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("missing");

        assert!(create_archive(&package).is_err());
        assert!(!archive_path_for(&package).exists());
    }
}
