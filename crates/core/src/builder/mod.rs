//! Package assembly.
//!
//! [`PackageBuilder::build_package`] runs a fixed sequence of stages for one record:
//!
//! ```text
//! CreateLayout → CopyContentFiles → StageSchemaArtifacts → GenerateMetadata
//!   → BackfillPlaceholders → Archive → [Cleanup]
//! ```
//!
//! Each record writes only beneath `output_root/<folder path>/<package name>`, so builders for
//! different records can run concurrently. A failing stage ends the build; the failure is
//! reported in the returned [`PackageBuildResult`] rather than as an `Err`.

mod archive;
mod layout;

pub use archive::{archive_path_for, create_archive};
pub use layout::{create_layout, stage_schemas};

use crate::config::AipConfig;
use crate::constants::REP_DATA_DIR;
use crate::metadata::{MetadataGenerator, PackageContext};
use crate::model::{ContentFacts, Record};
use crate::validator::{ValidationResult, Validator};
use crate::{AipError, AipResult};
use aip_files::{ContentInspector, DataDirectory};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Build stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BuildStage {
    CreateLayout,
    CopyContentFiles,
    StageSchemaArtifacts,
    GenerateMetadata,
    BackfillPlaceholders,
    Archive,
    Cleanup,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStage::CreateLayout => "create layout",
            BuildStage::CopyContentFiles => "copy content files",
            BuildStage::StageSchemaArtifacts => "stage schema artifacts",
            BuildStage::GenerateMetadata => "generate metadata",
            BuildStage::BackfillPlaceholders => "backfill placeholders",
            BuildStage::Archive => "archive",
            BuildStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// What happened to one item during content copying.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ItemCopyOutcome {
    pub sequence_number: u32,
    pub source: PathBuf,
    pub final_filename: Option<String>,
    /// An identical file was already in the data directory
    pub deduplicated: bool,
    pub error: Option<String>,
}

impl ItemCopyOutcome {
    pub fn copied(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of building one record's package.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PackageBuildResult {
    pub record_id: String,
    pub success: bool,
    pub package_dir: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub package_size_bytes: u64,
    pub archive_size_bytes: u64,
    pub elapsed: Duration,
    pub files_copied: usize,
    pub item_outcomes: Vec<ItemCopyOutcome>,
    pub error: Option<String>,
    pub failed_stage: Option<BuildStage>,
    /// Present when the builder was configured to validate before cleanup
    pub validation: Option<ValidationResult>,
}

impl PackageBuildResult {
    /// A result for a record that never reached the builder.
    pub fn failed(record_id: &str, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            record_id: record_id.to_owned(),
            success: false,
            package_dir: None,
            archive_path: None,
            package_size_bytes: 0,
            archive_size_bytes: 0,
            elapsed,
            files_copied: 0,
            item_outcomes: Vec::new(),
            error: Some(error.into()),
            failed_stage: None,
            validation: None,
        }
    }
}

struct StageError {
    stage: BuildStage,
    error: AipError,
}

trait AtStage<T> {
    fn at(self, stage: BuildStage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for AipResult<T> {
    fn at(self, stage: BuildStage) -> Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

#[derive(Default)]
struct BuildProgress {
    package_dir: Option<PathBuf>,
    archive_path: Option<PathBuf>,
    package_size_bytes: u64,
    archive_size_bytes: u64,
    item_outcomes: Vec<ItemCopyOutcome>,
    validation: Option<ValidationResult>,
}

/// Assembles packages. Cheap to clone; one instance may serve many records.
#[derive(Clone)]
pub struct PackageBuilder {
    config: Arc<AipConfig>,
    inspector: Arc<dyn ContentInspector>,
    generator: MetadataGenerator,
    validator: Option<Validator>,
}

impl PackageBuilder {
    pub fn new(
        config: Arc<AipConfig>,
        inspector: Arc<dyn ContentInspector>,
        generator: MetadataGenerator,
    ) -> Self {
        Self {
            config,
            inspector,
            generator,
            validator: None,
        }
    }

    /// Validate each archived package before the working directory is cleaned up.
    pub fn with_validator(mut self, validator: Option<Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &AipConfig {
        &self.config
    }

    /// Package directory a record is built into.
    pub fn package_dir(record: &Record, output_root: &Path) -> PathBuf {
        output_root
            .join(record.folder_path())
            .join(record.package_name())
    }

    /// Build the package for `record`.
    ///
    /// Post-copy facts are written back onto the record's items. Any previous facts are
    /// cleared first, so building the same record twice produces a consistent package.
    pub fn build_package(
        &self,
        record: &mut Record,
        pool_root: &Path,
        output_root: &Path,
    ) -> PackageBuildResult {
        let started = Instant::now();
        let mut progress = BuildProgress::default();
        tracing::info!(record_id = record.record_id(), "building package");

        let outcome = self.run_stages(record, pool_root, output_root, &mut progress);
        let files_copied = progress.item_outcomes.iter().filter(|o| o.copied()).count();
        let elapsed = started.elapsed();

        let (success, error, failed_stage) = match outcome {
            Ok(()) => {
                tracing::info!(
                    record_id = record.record_id(),
                    files = files_copied,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "package built"
                );
                (true, None, None)
            }
            Err(StageError { stage, error }) => {
                tracing::error!(
                    record_id = record.record_id(),
                    stage = %stage,
                    error = %error,
                    "package build failed"
                );
                (false, Some(error.to_string()), Some(stage))
            }
        };

        PackageBuildResult {
            record_id: record.record_id().to_owned(),
            success,
            package_dir: progress.package_dir,
            archive_path: progress.archive_path,
            package_size_bytes: progress.package_size_bytes,
            archive_size_bytes: progress.archive_size_bytes,
            elapsed,
            files_copied,
            item_outcomes: progress.item_outcomes,
            error,
            failed_stage,
            validation: progress.validation,
        }
    }

    fn run_stages(
        &self,
        record: &mut Record,
        pool_root: &Path,
        output_root: &Path,
        progress: &mut BuildProgress,
    ) -> Result<(), StageError> {
        let package_dir = Self::package_dir(record, output_root);
        progress.package_dir = Some(package_dir.clone());

        create_layout(&package_dir).at(BuildStage::CreateLayout)?;

        progress.item_outcomes = self.copy_content(record, pool_root, &package_dir);
        if !progress.item_outcomes.iter().any(ItemCopyOutcome::copied) {
            return Err(StageError {
                stage: BuildStage::CopyContentFiles,
                error: AipError::NoContentCopied(record.record_id().to_owned()),
            });
        }

        let schemas = stage_schemas(&package_dir, self.config.schema_dir())
            .at(BuildStage::StageSchemaArtifacts)?;

        let context = PackageContext {
            record,
            config: &self.config,
            created_at: Utc::now(),
            schemas: &schemas,
        };
        self.generator
            .generate(&package_dir, &context)
            .at(BuildStage::GenerateMetadata)?;

        self.generator
            .backfill(&package_dir, record)
            .at(BuildStage::BackfillPlaceholders)?;

        progress.package_size_bytes = directory_size(&package_dir).at(BuildStage::Archive)?;
        let (archive_path, archive_size) =
            create_archive(&package_dir).at(BuildStage::Archive)?;
        progress.archive_path = Some(archive_path);
        progress.archive_size_bytes = archive_size;

        if let Some(validator) = &self.validator {
            let validation = validator.validate_package(&package_dir);
            if !validation.is_valid() {
                tracing::warn!(
                    record_id = record.record_id(),
                    errors = validation.errors().len(),
                    "built package failed validation"
                );
            }
            progress.validation = Some(validation);
        }

        if self.config.cleanup_after_archive() {
            cleanup_working_dir(&package_dir);
        }
        Ok(())
    }

    /// Copy every item's source into the data directory and record its facts.
    fn copy_content(
        &self,
        record: &mut Record,
        pool_root: &Path,
        package_dir: &Path,
    ) -> Vec<ItemCopyOutcome> {
        let data_dir = package_dir.join(REP_DATA_DIR);
        let data = match DataDirectory::new(&data_dir) {
            Ok(data) => data,
            Err(e) => {
                return record
                    .items()
                    .iter()
                    .map(|item| ItemCopyOutcome {
                        sequence_number: item.sequence_number(),
                        source: item.source_relative_path().to_path_buf(),
                        final_filename: None,
                        deduplicated: false,
                        error: Some(e.to_string()),
                    })
                    .collect();
            }
        };

        let record_id = record.record_id().to_owned();
        let mut outcomes = Vec::with_capacity(record.items().len());
        for item in record.items_mut() {
            item.clear_content();
            let source = pool_root.join(item.source_relative_path());
            let mut outcome = ItemCopyOutcome {
                sequence_number: item.sequence_number(),
                source: item.source_relative_path().to_path_buf(),
                final_filename: None,
                deduplicated: false,
                error: None,
            };

            match data.place(&source) {
                Ok(placed) => {
                    let report = self.inspector.inspect(&data.path().join(&placed.filename));
                    if let Some(inspect_error) = &report.error {
                        tracing::warn!(
                            record_id = %record_id,
                            file = %placed.filename,
                            error = %inspect_error,
                            "content inspection reported a problem"
                        );
                    }
                    if report.is_encrypted {
                        tracing::warn!(record_id = %record_id, file = %placed.filename, "content file is encrypted");
                    }
                    item.record_content(ContentFacts {
                        final_filename: placed.filename.clone(),
                        size_bytes: placed.size_bytes,
                        sha256: placed.sha256,
                        page_count: report.page_count,
                    });
                    outcome.final_filename = Some(placed.filename);
                    outcome.deduplicated = placed.deduplicated;
                }
                Err(e) => {
                    tracing::warn!(
                        record_id = %record_id,
                        source = %source.display(),
                        error = %e,
                        "failed to copy content file"
                    );
                    outcome.error = Some(e.to_string());
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Remove a package working directory after archiving. Failure is logged, never returned.
pub fn cleanup_working_dir(package_dir: &Path) -> bool {
    match fs::remove_dir_all(package_dir) {
        Ok(()) => {
            tracing::debug!(package = %package_dir.display(), "removed working directory");
            true
        }
        Err(e) => {
            tracing::warn!(
                package = %package_dir.display(),
                stage = %BuildStage::Cleanup,
                error = %e,
                "failed to remove working directory"
            );
            false
        }
    }
}

/// Total size of the regular files under `dir`.
pub fn directory_size(dir: &Path) -> AipResult<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::{METS_FILENAME, REP_METS_PATH, REP_PREMIS_PATH, ROOT_EAD_PATH};
    use crate::model::{Item, ItemDescription, RecordDescription};
    use aip_files::PdfInspector;

    /// A one-page PDF that parses cleanly.
    pub(crate) fn pdf() -> Vec<u8> {
        use lopdf::{dictionary, Document, Object};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub(crate) fn builder(cleanup: bool) -> PackageBuilder {
        let config = AipConfig::new("Chi cục Thú y", Some("HTJSC".into()))
            .unwrap()
            .with_cleanup(cleanup);
        PackageBuilder::new(
            Arc::new(config),
            Arc::new(PdfInspector),
            MetadataGenerator::default(),
        )
    }

    pub(crate) fn pool_record(pool: &Path, files: &[&str]) -> Record {
        for file in files {
            let path = pool.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, pdf()).unwrap();
        }
        let mut record = Record::new(
            "1",
            Some("CODE123"),
            RecordDescription::default(),
            Some("HTJSC"),
        )
        .unwrap();
        record.set_original_folder_path("hoso01");
        let items = files
            .iter()
            .enumerate()
            .map(|(i, f)| Item::new(i as u32 + 1, *f, ItemDescription::default()).unwrap())
            .collect();
        record.attach_items(items).unwrap();
        record
    }

    #[test]
    fn test_build_package_happy_path() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(
            pool.path(),
            &["hoso01/CODE123.1.pdf", "hoso01/CODE123.2.pdf"],
        );

        let result = builder(false).build_package(&mut record, pool.path(), out.path());

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.files_copied, 2);
        assert!(result.failed_stage.is_none());
        let package = result.package_dir.unwrap();
        assert!(package.starts_with(out.path().join("hoso01")));
        for path in [METS_FILENAME, ROOT_EAD_PATH, REP_METS_PATH, REP_PREMIS_PATH] {
            assert!(package.join(path).is_file(), "{path}");
        }
        assert!(package
            .join("representations/rep1/metadata/descriptive/EAD_doc_File2.xml")
            .is_file());
        let mets = fs::read_to_string(package.join(METS_FILENAME)).unwrap();
        assert!(!mets.contains("PLACEHOLDER_"));

        let archive = result.archive_path.unwrap();
        assert!(archive.is_file());
        assert_eq!(result.archive_size_bytes, fs::metadata(archive).unwrap().len());
        assert!(result.package_size_bytes > 0);
        assert_eq!(record.items()[0].page_count(), Some(1));
    }

    #[test]
    fn test_missing_source_is_per_item_failure() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(pool.path(), &["hoso01/CODE123.1.pdf", "hoso01/CODE123.2.pdf"]);
        fs::remove_file(pool.path().join("hoso01/CODE123.2.pdf")).unwrap();

        let result = builder(false).build_package(&mut record, pool.path(), out.path());

        assert!(result.success);
        assert_eq!(result.files_copied, 1);
        assert!(result.item_outcomes[1].error.is_some());
        assert!(record.items()[1].content().is_none());
        let package = result.package_dir.unwrap();
        assert!(!package
            .join("representations/rep1/metadata/descriptive/EAD_doc_File2.xml")
            .exists());
    }

    #[test]
    fn test_nothing_copied_fails_copy_stage() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(pool.path(), &["hoso01/CODE123.1.pdf"]);
        fs::remove_file(pool.path().join("hoso01/CODE123.1.pdf")).unwrap();

        let result = builder(false).build_package(&mut record, pool.path(), out.path());

        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(BuildStage::CopyContentFiles));
        assert!(result.archive_path.is_none());
        assert!(result.error.unwrap().contains("no content files"));
    }

    #[test]
    fn test_colliding_names_are_disambiguated() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(
            pool.path(),
            &["hoso01/CODE123.1.pdf", "hoso01/scans/CODE123.1.pdf"],
        );
        fs::write(pool.path().join("hoso01/scans/CODE123.1.pdf"), b"%PDF-1.7 other").unwrap();

        let result = builder(false).build_package(&mut record, pool.path(), out.path());

        assert!(result.success);
        let names: Vec<_> = result
            .item_outcomes
            .iter()
            .map(|o| o.final_filename.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["CODE123.1.pdf", "CODE123.1_001.pdf"]);

        let data = result.package_dir.unwrap().join(REP_DATA_DIR);
        for (item, source) in record
            .items()
            .iter()
            .zip(["hoso01/CODE123.1.pdf", "hoso01/scans/CODE123.1.pdf"])
        {
            let facts = item.content().unwrap();
            let (_, placed) = aip_files::sha256_file(&data.join(&facts.final_filename)).unwrap();
            let (_, original) = aip_files::sha256_file(&pool.path().join(source)).unwrap();
            assert_eq!(facts.sha256, placed);
            assert_eq!(placed, original);
        }
        assert_ne!(
            record.items()[0].content().unwrap().sha256,
            record.items()[1].content().unwrap().sha256
        );
    }

    #[test]
    fn test_grouped_pool_builds_valid_package() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(pool.path().join("hoso01")).unwrap();
        for name in ["CODE123.2.pdf", "CODE123.1.pdf"] {
            fs::write(pool.path().join("hoso01").join(name), pdf()).unwrap();
        }
        let mut records = vec![Record::new(
            "1",
            Some("CODE123"),
            RecordDescription::default(),
            Some("HTJSC"),
        )
        .unwrap()];

        let outcome = crate::grouping::FileGrouper::new(pool.path())
            .unwrap()
            .group_by_folder(&mut records)
            .unwrap();
        assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);
        assert!(outcome.unmatched_records.is_empty());
        let record = &mut records[0];
        assert_eq!(record.items().len(), 2);

        let result = builder(false).build_package(record, pool.path(), out.path());
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.files_copied, 2);

        let validation = Validator::new()
            .with_checksums(true)
            .validate_package(&result.package_dir.unwrap());
        assert!(validation.is_valid(), "{:?}", validation.errors());
        assert!(validation.warnings().is_empty(), "{:?}", validation.warnings());
    }

    #[test]
    fn test_titles_spelling_tokens_survive_build() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let path = pool.path().join("hoso01/CODE123.1.pdf");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, pdf()).unwrap();
        let description = RecordDescription {
            title: Some("Báo cáo PLACEHOLDER_TEST".into()),
            ..RecordDescription::default()
        };
        let mut record = Record::new("1", Some("CODE123"), description, Some("HTJSC")).unwrap();
        record.set_original_folder_path("hoso01");
        let item_description = ItemDescription {
            title: Some("PLACEHOLDER_EAD_SIZE".into()),
            ..ItemDescription::default()
        };
        record
            .attach_items(vec![Item::new(1, "hoso01/CODE123.1.pdf", item_description).unwrap()])
            .unwrap();

        let result = builder(false).build_package(&mut record, pool.path(), out.path());

        assert!(result.success, "{:?}", result.error);
        let package = result.package_dir.unwrap();
        let mets = crate::xml::XmlDocument::parse_file(&package.join(METS_FILENAME)).unwrap();
        assert_eq!(mets.root.attr("LABEL"), Some("Báo cáo PLACEHOLDER_TEST"));
        let rep_mets = crate::xml::XmlDocument::parse_file(&package.join(REP_METS_PATH)).unwrap();
        let item_div = rep_mets
            .root
            .find_all(crate::constants::METS_NS, "div")
            .into_iter()
            .find(|div| div.attr("ORDER") == Some("1"))
            .unwrap();
        assert_eq!(item_div.attr("LABEL"), Some("PLACEHOLDER_EAD_SIZE"));

        let validation = Validator::new().validate_package(&package);
        assert!(validation.is_valid(), "{:?}", validation.errors());
    }

    #[test]
    fn test_cleanup_removes_working_dir() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(pool.path(), &["hoso01/CODE123.1.pdf"]);

        let result = builder(true).build_package(&mut record, pool.path(), out.path());

        assert!(result.success);
        assert!(!result.package_dir.unwrap().exists());
        assert!(result.archive_path.unwrap().is_file());
    }

    #[test]
    fn test_rebuild_is_consistent() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(pool.path(), &["hoso01/CODE123.1.pdf"]);
        let b = builder(false);

        let first = b.build_package(&mut record, pool.path(), out.path());
        let second = b.build_package(&mut record, pool.path(), out.path());

        assert!(first.success && second.success);
        assert!(second.item_outcomes[0].deduplicated);
        assert_eq!(
            second.item_outcomes[0].final_filename.as_deref(),
            Some("CODE123.1.pdf")
        );
    }

    #[test]
    fn test_validation_runs_before_cleanup() {
        let pool = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let mut record = pool_record(pool.path(), &["hoso01/CODE123.1.pdf"]);

        let result = builder(true)
            .with_validator(Some(Validator::new()))
            .build_package(&mut record, pool.path(), out.path());

        assert!(result.success);
        let validation = result.validation.unwrap();
        assert!(validation.is_valid(), "{:?}", validation.errors());
        assert!(!result.package_dir.unwrap().exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_not_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(!cleanup_working_dir(&temp.path().join("none")));
    }
}
