//! Partitioning the content pool into per-record folder groups.
//!
//! The pool root holds one sub-folder per record (possibly nested further). Each content file
//! is expected to be named `<code>.<sequence>.pdf`:
//!
//! ```text
//! pool/
//! ├── hoso01/
//! │   ├── CODE123.1.pdf
//! │   └── CODE123.2.pdf
//! └── hoso02/
//!     └── scans/CODE456.1.pdf
//! ```
//!
//! Records are matched to folders by, in order:
//!
//! 1. paper-file code equal (ignoring case) to a code extracted from a file name
//! 2. paper-file code equal to the folder name, only when no file name yielded a code
//! 3. the folder's normalised name contained in the record's normalised organization name
//!
//! Each rule is tried for every record before the next rule is considered, so a folder whose
//! file names carry a record's code goes to that record even when an earlier record would also
//! match it by organization name.
//!
//! A record claims at most one folder and a folder at most one record. Folders nobody claims
//! are errors: their content is never attributed to an arbitrary record.

use crate::model::{Item, ItemDescription, Record};
use crate::text::normalize_code;
use crate::{AipError, AipResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How a folder was matched to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MatchRule {
    CodeEquality,
    FolderName,
    OrganizationToken,
}

impl MatchRule {
    /// Rules in the order they are applied.
    pub const PRIORITY: [MatchRule; 3] = [
        MatchRule::CodeEquality,
        MatchRule::FolderName,
        MatchRule::OrganizationToken,
    ];

    fn accepts(self, record: &Record, group: &FolderGroup) -> bool {
        let code = record.paper_file_code().to_lowercase();
        match self {
            MatchRule::CodeEquality => group.codes.iter().any(|c| c.to_lowercase() == code),
            MatchRule::FolderName => {
                group.codes.is_empty() && group.folder_name.to_lowercase() == code
            }
            MatchRule::OrganizationToken => {
                let org_token = record
                    .description()
                    .organization_name
                    .as_deref()
                    .map(|name| normalize_code(name).to_lowercase())
                    .unwrap_or_default();
                let token = normalize_code(&group.folder_name).to_lowercase();
                !org_token.is_empty() && !token.is_empty() && org_token.contains(&token)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One finding about the pool layout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GroupingDiagnostic {
    pub severity: Severity,
    pub folder: Option<String>,
    pub message: String,
}

/// A content file found under a folder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContentFile {
    /// Path relative to the pool root
    pub relative_path: PathBuf,
    pub filename: String,
    pub code: Option<String>,
    pub sequence: Option<u32>,
}

/// The content files of one pool sub-folder and the record they were matched to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FolderGroup {
    pub folder_name: String,
    /// Ordered by extracted sequence, then by path
    pub files: Vec<ContentFile>,
    /// Distinct extracted codes in first-seen order
    pub codes: Vec<String>,
    pub representative_code: Option<String>,
    pub record_id: Option<String>,
    pub matched_by: Option<MatchRule>,
}

/// Result of grouping the pool against a set of records.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GroupingOutcome {
    pub groups: BTreeMap<String, FolderGroup>,
    pub diagnostics: Vec<GroupingDiagnostic>,
    pub unmatched_records: Vec<String>,
    pub unmatched_folders: Vec<String>,
    pub skipped_folders: Vec<String>,
}

impl GroupingOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics_at(&self, severity: Severity) -> impl Iterator<Item = &GroupingDiagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    fn push(&mut self, severity: Severity, folder: Option<&str>, message: String) {
        match severity {
            Severity::Error => tracing::error!(folder = folder.unwrap_or("-"), "{}", message),
            Severity::Warning => tracing::warn!(folder = folder.unwrap_or("-"), "{}", message),
            Severity::Info => tracing::info!(folder = folder.unwrap_or("-"), "{}", message),
        }
        self.diagnostics.push(GroupingDiagnostic {
            severity,
            folder: folder.map(str::to_owned),
            message,
        });
    }
}

/// Splits `<code>.<digits>.pdf` (extension case-insensitive) into code and sequence.
pub fn parse_content_filename(filename: &str) -> Option<(String, u32)> {
    let len = filename.len();
    if len <= 4 || !filename.is_char_boundary(len - 4) {
        return None;
    }
    let (stem, ext) = filename.split_at(len - 4);
    if !ext.eq_ignore_ascii_case(".pdf") {
        return None;
    }

    let dot = stem.rfind('.')?;
    let (code, digits) = (&stem[..dot], &stem[dot + 1..]);
    if code.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sequence = digits.parse().ok()?;
    Some((code.to_owned(), sequence))
}

fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Scans a content pool and matches its folders to records.
#[derive(Debug)]
pub struct FileGrouper {
    pool_root: PathBuf,
}

impl FileGrouper {
    /// # Errors
    ///
    /// Returns [`AipError::PoolRootNotFound`] if `pool_root` is not an existing directory.
    pub fn new(pool_root: &Path) -> AipResult<Self> {
        if !pool_root.is_dir() {
            return Err(AipError::PoolRootNotFound(pool_root.display().to_string()));
        }
        Ok(Self {
            pool_root: pool_root.to_path_buf(),
        })
    }

    pub fn pool_root(&self) -> &Path {
        &self.pool_root
    }

    /// Group the pool's folders, match them to `records` and attach items to matched records.
    ///
    /// Records that already carry items keep them; only their folder path and code are updated.
    ///
    /// # Errors
    ///
    /// Only failures to read the pool root itself are returned. Per-folder and per-file
    /// problems become diagnostics.
    pub fn group_by_folder(&self, records: &mut [Record]) -> AipResult<GroupingOutcome> {
        let mut outcome = GroupingOutcome::default();
        self.scan(&mut outcome)?;
        self.match_records(records, &mut outcome);

        for group in outcome.groups.values() {
            let Some(record_id) = &group.record_id else {
                continue;
            };
            let Some(record) = records.iter_mut().find(|r| r.record_id() == record_id) else {
                continue;
            };
            if let Err(e) = attach_group(record, group) {
                let message = format!("could not attach items to record {}: {}", record_id, e);
                outcome.diagnostics.push(GroupingDiagnostic {
                    severity: Severity::Error,
                    folder: Some(group.folder_name.clone()),
                    message,
                });
            }
        }

        tracing::info!(
            folders = outcome.groups.len(),
            matched = outcome.groups.values().filter(|g| g.record_id.is_some()).count(),
            unmatched_records = outcome.unmatched_records.len(),
            unmatched_folders = outcome.unmatched_folders.len(),
            "grouped content pool"
        );
        Ok(outcome)
    }

    fn scan(&self, outcome: &mut GroupingOutcome) -> AipResult<()> {
        let mut folders: Vec<(String, PathBuf)> = fs::read_dir(&self.pool_root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
            .collect();
        folders.sort();

        for (folder_name, folder_path) in folders {
            let mut files = Vec::new();
            for entry in WalkDir::new(&folder_path).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        outcome.push(
                            Severity::Warning,
                            Some(&folder_name),
                            format!("unreadable entry: {}", e),
                        );
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !is_content_file(entry.path()) {
                    continue;
                }
                let relative_path = entry
                    .path()
                    .strip_prefix(&self.pool_root)
                    .unwrap_or(entry.path())
                    .to_path_buf();
                let filename = entry.file_name().to_string_lossy().into_owned();
                let (code, sequence) = match parse_content_filename(&filename) {
                    Some((code, sequence)) => (Some(code), Some(sequence)),
                    None => (None, None),
                };
                files.push(ContentFile {
                    relative_path,
                    filename,
                    code,
                    sequence,
                });
            }

            if files.is_empty() {
                outcome.push(
                    Severity::Info,
                    Some(&folder_name),
                    "no content files; folder skipped".into(),
                );
                outcome.skipped_folders.push(folder_name);
                continue;
            }

            files.sort_by(|a, b| {
                (a.sequence.unwrap_or(u32::MAX), &a.relative_path)
                    .cmp(&(b.sequence.unwrap_or(u32::MAX), &b.relative_path))
            });
            let group = build_group(folder_name, files);
            check_group(&group, outcome);
            outcome.groups.insert(group.folder_name.clone(), group);
        }
        Ok(())
    }

    fn match_records(&self, records: &[Record], outcome: &mut GroupingOutcome) {
        let mut matched = vec![false; records.len()];

        for rule in MatchRule::PRIORITY {
            for (record, done) in records.iter().zip(matched.iter_mut()) {
                if *done {
                    continue;
                }
                let Some(folder) = find_unclaimed(outcome, |g| rule.accepts(record, g)) else {
                    continue;
                };
                tracing::debug!(
                    record_id = record.record_id(),
                    folder = %folder,
                    ?rule,
                    "matched record"
                );
                if let Some(group) = outcome.groups.get_mut(&folder) {
                    group.record_id = Some(record.record_id().to_owned());
                    group.matched_by = Some(rule);
                }
                *done = true;
            }
        }

        for (record, _) in records.iter().zip(&matched).filter(|(_, done)| !**done) {
            outcome.unmatched_records.push(record.record_id().to_owned());
            outcome.push(
                Severity::Warning,
                None,
                format!(
                    "record {} (code {}) matched no folder",
                    record.record_id(),
                    record.paper_file_code()
                ),
            );
        }

        let unmatched: Vec<String> = outcome
            .groups
            .values()
            .filter(|g| g.record_id.is_none())
            .map(|g| g.folder_name.clone())
            .collect();
        for folder in unmatched {
            outcome.push(
                Severity::Error,
                Some(&folder),
                "folder matched no record; its content is not attributed".into(),
            );
            outcome.unmatched_folders.push(folder);
        }
    }
}

fn find_unclaimed(
    outcome: &GroupingOutcome,
    predicate: impl Fn(&FolderGroup) -> bool,
) -> Option<String> {
    outcome
        .groups
        .values()
        .filter(|g| g.record_id.is_none())
        .find(|g| predicate(g))
        .map(|g| g.folder_name.clone())
}

fn build_group(folder_name: String, files: Vec<ContentFile>) -> FolderGroup {
    let mut codes: Vec<String> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for code in files.iter().filter_map(|f| f.code.as_deref()) {
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_owned());
        }
        *counts.entry(code).or_default() += 1;
    }

    // Most frequent code; `codes` is in first-seen order so the earliest wins ties.
    let mut representative_code: Option<String> = None;
    let mut best = 0;
    for code in &codes {
        let count = counts.get(code.as_str()).copied().unwrap_or(0);
        if count > best {
            best = count;
            representative_code = Some(code.clone());
        }
    }

    FolderGroup {
        folder_name,
        files,
        codes,
        representative_code,
        record_id: None,
        matched_by: None,
    }
}

fn check_group(group: &FolderGroup, outcome: &mut GroupingOutcome) {
    let folder = group.folder_name.as_str();

    if group.codes.len() > 1 {
        outcome.push(
            Severity::Warning,
            Some(folder),
            format!(
                "multiple codes {:?}; representative code {}",
                group.codes,
                group.representative_code.as_deref().unwrap_or("-")
            ),
        );
    }

    let mut sequences: Vec<u32> = group.files.iter().filter_map(|f| f.sequence).collect();
    sequences.sort_unstable();
    if !sequences.is_empty() {
        let expected: Vec<u32> = (1..=sequences.len() as u32).collect();
        if sequences != expected {
            outcome.push(
                Severity::Warning,
                Some(folder),
                format!(
                    "non-contiguous sequence. Has: {:?}, expected: {:?}",
                    sequences, expected
                ),
            );
        }

        let mut duplicates: Vec<u32> = sequences
            .windows(2)
            .filter(|w| w[0] == w[1])
            .map(|w| w[0])
            .collect();
        duplicates.dedup();
        if !duplicates.is_empty() {
            outcome.push(
                Severity::Warning,
                Some(folder),
                format!("duplicate sequence numbers {:?}", duplicates),
            );
        }
    }

    for file in group.files.iter().filter(|f| f.code.is_none()) {
        outcome.push(
            Severity::Warning,
            Some(folder),
            format!("{} does not match <code>.<number>.pdf", file.filename),
        );
    }
}

fn attach_group(record: &mut Record, group: &FolderGroup) -> AipResult<()> {
    record.set_original_folder_path(&group.folder_name);
    if let Some(code) = &group.representative_code {
        record.adopt_paper_file_code(code);
    }
    if !record.items().is_empty() {
        return Ok(());
    }

    let items = group
        .files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let description = ItemDescription {
                document_code: file.code.clone(),
                ..ItemDescription::default()
            };
            Item::new(index as u32 + 1, &file.relative_path, description)
        })
        .collect::<AipResult<Vec<_>>>()?;
    record.attach_items(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordDescription;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"%PDF-1.4\n").unwrap();
    }

    fn record(id: &str, code: Option<&str>, org: Option<&str>) -> Record {
        let description = RecordDescription {
            organization_name: org.map(str::to_owned),
            ..RecordDescription::default()
        };
        Record::new(id, code, description, None).unwrap()
    }

    #[test]
    fn test_parse_content_filename() {
        assert_eq!(
            parse_content_filename("CODE123.2.pdf"),
            Some(("CODE123".into(), 2))
        );
        assert_eq!(
            parse_content_filename("A.B.10.PDF"),
            Some(("A.B".into(), 10))
        );
        assert_eq!(parse_content_filename("CODE123.pdf"), None);
        assert_eq!(parse_content_filename(".1.pdf"), None);
        assert_eq!(parse_content_filename("A.x1.pdf"), None);
        assert_eq!(parse_content_filename("A.1.txt"), None);
        assert_eq!(parse_content_filename("Hồ.1.pdf"), Some(("Hồ".into(), 1)));
    }

    #[test]
    fn test_missing_pool_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            FileGrouper::new(&temp.path().join("missing")),
            Err(AipError::PoolRootNotFound(_))
        ));
    }

    #[test]
    fn test_code_match_attaches_items() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "hoso01/CODE123.2.pdf");
        write(temp.path(), "hoso01/CODE123.1.pdf");
        let mut records = vec![record("1", Some("code123"), None)];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        let group = &outcome.groups["hoso01"];
        assert_eq!(group.record_id.as_deref(), Some("1"));
        assert_eq!(group.matched_by, Some(MatchRule::CodeEquality));
        assert!(!outcome.has_errors());
        assert!(outcome.diagnostics_at(Severity::Warning).next().is_none());

        let items = records[0].items();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].source_relative_path(),
            Path::new("hoso01/CODE123.1.pdf")
        );
        assert_eq!(items[1].sequence_number(), 2);
        assert_eq!(records[0].folder_path(), "hoso01");
    }

    #[test]
    fn test_gap_produces_warning() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "f/A.1.pdf");
        write(temp.path(), "f/A.3.pdf");
        let mut records = vec![record("1", Some("A"), None)];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        let warnings: Vec<_> = outcome.diagnostics_at(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Has: [1, 3], expected: [1, 2]"));
        assert_eq!(records[0].items().len(), 2);
    }

    #[test]
    fn test_duplicate_and_unmatched_file_warnings() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "f/A.1.pdf");
        write(temp.path(), "f/sub/A.1.pdf");
        write(temp.path(), "f/scan.pdf");
        let mut records = vec![record("1", Some("A"), None)];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();
        let messages: Vec<&str> = outcome
            .diagnostics_at(Severity::Warning)
            .map(|d| d.message.as_str())
            .collect();

        assert!(messages.iter().any(|m| m.contains("duplicate sequence numbers [1]")));
        assert!(messages.iter().any(|m| m.contains("scan.pdf does not match")));
        assert_eq!(records[0].items().len(), 3);
    }

    #[test]
    fn test_representative_code_is_most_frequent() {
        let files = ["B.1.pdf", "A.2.pdf", "A.3.pdf", "B.4.pdf", "A.5.pdf"]
            .iter()
            .map(|name| {
                let (code, sequence) = parse_content_filename(name).unwrap();
                ContentFile {
                    relative_path: PathBuf::from(name),
                    filename: name.to_string(),
                    code: Some(code),
                    sequence: Some(sequence),
                }
            })
            .collect();
        let group = build_group("f".into(), files);

        assert_eq!(group.codes, vec!["B".to_string(), "A".to_string()]);
        assert_eq!(group.representative_code.as_deref(), Some("A"));
    }

    #[test]
    fn test_representative_code_tie_uses_first_seen() {
        let files = ["B.1.pdf", "A.2.pdf"]
            .iter()
            .map(|name| ContentFile {
                relative_path: PathBuf::from(name),
                filename: name.to_string(),
                code: Some(name[..1].to_string()),
                sequence: None,
            })
            .collect();

        assert_eq!(
            build_group("f".into(), files).representative_code.as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_folder_name_rule_only_without_codes() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "HS01/scan_a.pdf");
        write(temp.path(), "HS02/X.1.pdf");
        let mut records = vec![record("1", Some("hs01"), None), record("2", Some("HS02"), None)];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        assert_eq!(outcome.groups["HS01"].matched_by, Some(MatchRule::FolderName));
        assert_eq!(outcome.groups["HS02"].record_id, None);
        assert_eq!(outcome.unmatched_records, vec!["2".to_string()]);
        assert_eq!(outcome.unmatched_folders, vec!["HS02".to_string()]);
        assert!(outcome.has_errors());
    }

    #[test]
    fn test_organization_token_rule() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Thu y/X.1.pdf");
        let mut records = vec![record("1", None, Some("Chi cục Thú y tỉnh"))];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        assert_eq!(
            outcome.groups["Thu y"].matched_by,
            Some(MatchRule::OrganizationToken)
        );
        // Derived code replaced by the folder's representative code.
        assert_eq!(records[0].paper_file_code(), "X");
    }

    #[test]
    fn test_exact_code_match_wins_over_organization_token() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Thu y/X.1.pdf");
        let mut records = vec![
            record("1", Some("NOPE"), Some("Chi cục Thú y")),
            record("2", Some("X"), None),
        ];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        let group = &outcome.groups["Thu y"];
        assert_eq!(group.record_id.as_deref(), Some("2"));
        assert_eq!(group.matched_by, Some(MatchRule::CodeEquality));
        assert_eq!(outcome.unmatched_records, vec!["1".to_string()]);
        assert!(records[0].items().is_empty());
        assert_eq!(records[1].items().len(), 1);
    }

    #[test]
    fn test_record_claims_one_folder() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a/A.1.pdf");
        write(temp.path(), "b/A.1.pdf");
        let mut records = vec![record("1", Some("A"), None)];

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();

        assert_eq!(outcome.groups["a"].record_id.as_deref(), Some("1"));
        assert_eq!(outcome.groups["b"].record_id, None);
        assert_eq!(outcome.unmatched_folders, vec!["b".to_string()]);
    }

    #[test]
    fn test_empty_folder_is_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("empty")).unwrap();
        fs::write(temp.path().join("empty/readme.txt"), b"x").unwrap();

        let outcome = FileGrouper::new(temp.path())
            .unwrap()
            .group_by_folder(&mut [])
            .unwrap();

        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.skipped_folders, vec!["empty".to_string()]);
        assert!(!outcome.has_errors());
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let temp = TempDir::new().unwrap();
        for rel in ["z/Z.2.pdf", "z/Z.1.pdf", "m/M.1.pdf", "a/A.1.pdf", "a/A.2.pdf"] {
            write(temp.path(), rel);
        }
        let grouper = FileGrouper::new(temp.path()).unwrap();

        let first = grouper.group_by_folder(&mut []).unwrap();
        let second = grouper.group_by_folder(&mut []).unwrap();

        assert_eq!(first.groups, second.groups);
        assert_eq!(first.diagnostics, second.diagnostics);
        let names: Vec<&String> = first.groups.keys().collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }
}
