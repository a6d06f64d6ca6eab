//! Package directory skeleton and schema staging.

use crate::constants::{REQUIRED_DIRECTORIES, SCHEMAS_DIR, SCHEMA_FILES};
use crate::metadata::StagedSchema;
use crate::{AipError, AipResult};
use aip_files::sha256_file;
use std::fs;
use std::path::Path;

/// Create every required package directory under `package_dir`.
pub fn create_layout(package_dir: &Path) -> AipResult<()> {
    for relative in std::iter::once("").chain(REQUIRED_DIRECTORIES) {
        let path = package_dir.join(relative);
        fs::create_dir_all(&path).map_err(|source| AipError::DirCreation {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Copy the reference schemas into `schemas/`.
///
/// A schema missing from `schema_dir` (or every schema, when no directory is configured) is
/// replaced by a marker file so the package layout stays complete.
pub fn stage_schemas(package_dir: &Path, schema_dir: Option<&Path>) -> AipResult<Vec<StagedSchema>> {
    let target_dir = package_dir.join(SCHEMAS_DIR);
    let mut staged = Vec::with_capacity(SCHEMA_FILES.len());

    for filename in SCHEMA_FILES {
        let target = target_dir.join(filename);
        let source = schema_dir
            .map(|dir| dir.join(filename))
            .filter(|path| path.is_file());

        let placeholder = match source {
            Some(source) => {
                fs::copy(&source, &target).map_err(|source_err| AipError::FileWrite {
                    path: target.display().to_string(),
                    source: source_err,
                })?;
                false
            }
            None => {
                tracing::warn!(schema = filename, "schema not available, writing placeholder");
                let marker = format!(
                    "<!-- Placeholder for {} -->\n<!-- Download from official source -->\n",
                    filename
                );
                fs::write(&target, marker).map_err(|source| AipError::FileWrite {
                    path: target.display().to_string(),
                    source,
                })?;
                true
            }
        };

        let (size_bytes, sha256) = sha256_file(&target)?;
        staged.push(StagedSchema {
            filename: filename.to_owned(),
            size_bytes,
            sha256,
            placeholder,
        });
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_layout() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("a").join("pkg");

        create_layout(&package).unwrap();

        for dir in REQUIRED_DIRECTORIES {
            assert!(package.join(dir).is_dir(), "{dir}");
        }
        // Existing layout is fine
        create_layout(&package).unwrap();
    }

    #[test]
    fn test_stage_schemas_copies_and_marks_missing() {
        let temp = TempDir::new().unwrap();
        let package = temp.path().join("pkg");
        create_layout(&package).unwrap();
        let schemas = temp.path().join("xsd");
        fs::create_dir_all(&schemas).unwrap();
        fs::write(schemas.join("mets.xsd"), "<xs:schema/>").unwrap();

        let staged = stage_schemas(&package, Some(&schemas)).unwrap();

        assert_eq!(staged.len(), 3);
        assert_eq!(staged[0].filename, "mets.xsd");
        assert!(!staged[0].placeholder);
        assert_eq!(staged[0].size_bytes, 12);
        assert!(staged[1].placeholder);
        let marker = fs::read_to_string(package.join("schemas/ead.xsd")).unwrap();
        assert!(marker.contains("Placeholder for ead.xsd"));
    }

    #[test]
    fn test_stage_schemas_without_directory() {
        let temp = TempDir::new().unwrap();
        create_layout(temp.path()).unwrap();

        let staged = stage_schemas(temp.path(), None).unwrap();
        assert!(staged.iter().all(|s| s.placeholder));
    }
}
