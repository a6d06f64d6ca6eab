//! Independent package validation.
//!
//! The validator knows nothing about how a package was built. It re-derives every structural and
//! referential property from the files on disk:
//!
//! 1. required directories
//! 2. root structural document sections and profile markers
//! 3. descriptive and preservation document content, including the representation and item
//!    documents when present
//! 4. content inventory (non-empty files with a recognisable header)
//! 5. structural references to `representations/rep1/data/*` against the files present
//! 6. optionally, preservation fixity values against recomputed digests
//!
//! Findings never abort validation; they accumulate in a [`ValidationResult`].

mod result;

pub use result::{AggregateValidation, ValidationResult};

use crate::constants::{
    CONTENT_HREF_PREFIX, CSIP_PROFILE, EAD_NS, METS_FILENAME, METS_NS, PREMIS_NS, PREMIS_VERSION,
    REP_DATA_DIR, REP_DESCRIPTIVE_DIR, REP_METS_PATH, REP_PREMIS_PATH, REQUIRED_DIRECTORIES,
    ROOT_EAD_PATH, ROOT_PREMIS_PATH, UNCALCULATED_DIGEST, XLINK_NS, XSI_NS,
};
use crate::xml::XmlDocument;
use crate::{AipError, AipResult};
use aip_files::{has_recognised_header, read_header, sha256_file};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

const METS_REQUIRED: [&str; 4] = ["metsHdr", "dmdSec", "fileSec", "structMap"];
const EAD_REQUIRED: [&str; 5] = ["unittitle", "unitid", "unitdate", "language", "scopecontent"];
const PREMIS_REQUIRED: [&str; 5] = ["objectIdentifier", "objectCategory", "fixity", "size", "format"];

/// Package validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    verify_checksums: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also recompute and compare content digests during [`Validator::validate_package`].
    pub fn with_checksums(mut self, verify_checksums: bool) -> Self {
        self.verify_checksums = verify_checksums;
        self
    }

    /// Validate one package directory.
    pub fn validate_package(&self, package_dir: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut result = ValidationResult::new();
        tracing::info!(package = %package_dir.display(), "validating package");

        if !package_dir.is_dir() {
            result.error(format!(
                "package directory does not exist: {}",
                package_dir.display()
            ));
            return result.finalize(0, 0, started);
        }

        check_directories(package_dir, &mut result);
        let root_mets = check_mets(package_dir, METS_FILENAME, true, &mut result);
        check_descriptive(package_dir, ROOT_EAD_PATH, &mut result);
        check_preservation(package_dir, ROOT_PREMIS_PATH, &mut result);
        check_mets(package_dir, REP_METS_PATH, false, &mut result);
        check_preservation(package_dir, REP_PREMIS_PATH, &mut result);
        check_item_documents(package_dir, &mut result);
        let physical = check_content(package_dir, &mut result);
        if let (Some(mets), Some(physical)) = (root_mets, physical) {
            check_references(&mets, &physical, &mut result);
        }
        if self.verify_checksums {
            result.merge(self.verify_checksums(package_dir));
        }

        let (files, size) = tally(package_dir);
        let result = result.finalize(files, size, started);
        tracing::info!(
            package = %package_dir.display(),
            valid = result.is_valid(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            "validation finished"
        );
        result
    }

    /// Compare every preservation fixity value with the digest of the file it describes.
    ///
    /// Digests are compared case-insensitively; `[TO_BE_CALCULATED]` values are skipped.
    pub fn verify_checksums(&self, package_dir: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut result = ValidationResult::new();
        let premis_path = package_dir.join(ROOT_PREMIS_PATH);

        let doc = match XmlDocument::parse_file(&premis_path) {
            Ok(doc) => doc,
            Err(e) => {
                result.error(format!("cannot verify checksums, {}: {}", ROOT_PREMIS_PATH, e));
                return result.finalize(0, 0, started);
            }
        };

        let mut verified = 0;
        let mut bytes = 0;
        for object in doc.root.find_all(PREMIS_NS, "object") {
            if object.attr_ns(XSI_NS, "type") != Some("premis:file") {
                continue;
            }
            let Some(location) = object.find_text(PREMIS_NS, "contentLocationValue") else {
                continue;
            };
            let Some(filename) = location.strip_prefix(CONTENT_HREF_PREFIX) else {
                continue;
            };

            let path = package_dir.join(REP_DATA_DIR).join(filename);
            if !path.is_file() {
                result.error(format!("file listed in preservation metadata is missing: {}", filename));
                continue;
            }
            let expected = match object.find_text(PREMIS_NS, "messageDigest") {
                Some(digest) if !digest.is_empty() => digest,
                _ => {
                    result.error(format!("no digest recorded for {}", filename));
                    continue;
                }
            };
            if expected == UNCALCULATED_DIGEST {
                continue;
            }

            match sha256_file(&path) {
                Ok((size, actual)) if actual.matches(expected) => {
                    verified += 1;
                    bytes += size;
                }
                Ok((_, actual)) => result.error(format!(
                    "checksum mismatch for {}: expected {}, got {}",
                    filename, expected, actual
                )),
                Err(e) => result.error(format!("cannot hash {}: {}", filename, e)),
            }
        }

        result.info(format!("{} checksums verified", verified));
        result.finalize(verified, bytes, started)
    }

    /// Validate every immediate sub-directory of `packages_root` as a package.
    ///
    /// # Errors
    ///
    /// Returns `AipError` if `packages_root` cannot be listed.
    pub fn validate_all(&self, packages_root: &Path) -> AipResult<AggregateValidation> {
        let entries = fs::read_dir(packages_root).map_err(|source| AipError::FileRead {
            path: packages_root.display().to_string(),
            source,
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut aggregate = AggregateValidation::default();
        for dir in dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            aggregate.insert(name, self.validate_package(&dir));
        }

        tracing::info!(
            total = aggregate.total,
            valid = aggregate.valid,
            invalid = aggregate.invalid,
            "validated packages"
        );
        Ok(aggregate)
    }
}

fn check_directories(package_dir: &Path, result: &mut ValidationResult) {
    for relative in REQUIRED_DIRECTORIES {
        let path = package_dir.join(relative);
        if !path.exists() {
            result.error(format!("required directory missing: {}", relative));
        } else if !path.is_dir() {
            result.error(format!("required path is not a directory: {}", relative));
        }
    }
}

/// Parse a document, reporting a missing file with the given severity.
fn load(
    package_dir: &Path,
    relative: &str,
    required: bool,
    result: &mut ValidationResult,
) -> Option<XmlDocument> {
    let path = package_dir.join(relative);
    if !path.is_file() {
        if required {
            result.error(format!("{} is missing", relative));
        } else {
            result.warning(format!("{} is missing", relative));
        }
        return None;
    }
    match XmlDocument::parse_file(&path) {
        Ok(doc) => Some(doc),
        Err(e) => {
            result.error(format!("{} is not well-formed: {}", relative, e));
            None
        }
    }
}

fn check_mets(
    package_dir: &Path,
    relative: &str,
    required: bool,
    result: &mut ValidationResult,
) -> Option<XmlDocument> {
    let doc = load(package_dir, relative, required, result)?;

    if !doc.root.is(METS_NS, "mets") {
        result.error(format!("{}: root element is not in the METS namespace", relative));
    }
    for name in METS_REQUIRED {
        if doc.root.find(METS_NS, name).is_none() {
            result.error(format!("{}: missing {}", relative, name));
        }
    }
    if doc.root.attr("TYPE").map_or(true, str::is_empty) {
        result.warning(format!("{}: no TYPE attribute", relative));
    }
    match doc.root.attr("PROFILE") {
        Some(profile) if profile == CSIP_PROFILE || profile.to_lowercase().contains("csip") => {}
        _ => result.warning(format!("{}: no CSIP profile declared", relative)),
    }

    result.info(format!("{} checked", relative));
    Some(doc)
}

fn check_descriptive(package_dir: &Path, relative: &str, result: &mut ValidationResult) {
    let Some(doc) = load(package_dir, relative, false, result) else {
        return;
    };
    if !doc.root.is(EAD_NS, "ead") {
        result.error(format!("{}: root element is not in the EAD namespace", relative));
    }
    for name in EAD_REQUIRED {
        if doc.root.find(EAD_NS, name).is_none() {
            result.error(format!("{}: missing {}", relative, name));
        }
    }
    result.info(format!("{} checked", relative));
}

fn check_preservation(package_dir: &Path, relative: &str, result: &mut ValidationResult) {
    let Some(doc) = load(package_dir, relative, false, result) else {
        return;
    };
    if !doc.declares(PREMIS_NS) {
        result.error(format!("{}: PREMIS namespace not declared", relative));
    }
    for name in PREMIS_REQUIRED {
        if doc.root.find(PREMIS_NS, name).is_none() {
            result.error(format!("{}: missing {}", relative, name));
        }
    }
    match doc.root.attr("version") {
        Some(PREMIS_VERSION) => {}
        other => result.warning(format!(
            "{}: PREMIS version {} (expected {})",
            relative,
            other.unwrap_or("absent"),
            PREMIS_VERSION
        )),
    }
    result.info(format!("{} checked", relative));
}

fn check_item_documents(package_dir: &Path, result: &mut ValidationResult) {
    let Ok(entries) = fs::read_dir(package_dir.join(REP_DESCRIPTIVE_DIR)) else {
        return;
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".xml"))
        .collect();
    names.sort();

    for name in names {
        check_descriptive(package_dir, &format!("{}/{}", REP_DESCRIPTIVE_DIR, name), result);
    }
}

/// Inventory the data directory. Returns the file names present, or `None` if it is missing.
fn check_content(package_dir: &Path, result: &mut ValidationResult) -> Option<BTreeSet<String>> {
    let data_dir = package_dir.join(REP_DATA_DIR);
    let entries = match fs::read_dir(&data_dir) {
        Ok(entries) => entries,
        Err(_) => {
            result.error(format!("data directory missing: {}", REP_DATA_DIR));
            return None;
        }
    };

    let mut present = BTreeSet::new();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == 0 => result.error(format!("content file is empty: {}", name)),
            Ok(_) => match read_header(&path) {
                Ok(header) if has_recognised_header(&header) => {}
                Ok(_) => result.error(format!("content file has no recognisable header: {}", name)),
                Err(e) => result.error(format!("cannot read {}: {}", name, e)),
            },
            Err(e) => result.error(format!("cannot read {}: {}", name, e)),
        }
        present.insert(name);
    }

    if present.is_empty() {
        result.warning("data directory holds no content files");
    } else {
        result.info(format!("{} content files found", present.len()));
    }
    Some(present)
}

fn check_references(mets: &XmlDocument, physical: &BTreeSet<String>, result: &mut ValidationResult) {
    let referenced: BTreeSet<String> = mets
        .root
        .find_all(METS_NS, "FLocat")
        .into_iter()
        .filter_map(|flocat| flocat.attr_ns(XLINK_NS, "href"))
        .filter_map(|href| href.strip_prefix(CONTENT_HREF_PREFIX))
        .map(str::to_owned)
        .collect();

    let orphans: Vec<&String> = physical.difference(&referenced).collect();
    let dangling: Vec<&String> = referenced.difference(physical).collect();
    for name in &orphans {
        result.warning(format!("content file not referenced by {}: {}", METS_FILENAME, name));
    }
    for name in &dangling {
        result.error(format!("{} references a missing content file: {}", METS_FILENAME, name));
    }
    if orphans.is_empty() && dangling.is_empty() {
        result.info("structural references match content files");
    }
}

fn tally(package_dir: &Path) -> (usize, u64) {
    WalkDir::new(package_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .fold((0, 0), |(count, size), entry| {
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (count + 1, size + len)
        })
}
