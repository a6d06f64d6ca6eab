//! Metadata document generation.
//!
//! Each package carries six kinds of interlinked XML document:
//!
//! | document                 | path                                                      |
//! |--------------------------|-----------------------------------------------------------|
//! | root structural          | `METS.xml`                                                |
//! | package descriptive      | `metadata/descriptive/EAD.xml`                            |
//! | package preservation     | `metadata/preservation/PREMIS.xml`                        |
//! | representation structural| `representations/rep1/METS.xml`                           |
//! | representation preserv.  | `representations/rep1/metadata/preservation/PREMIS_rep1.xml` |
//! | item descriptive (×N)    | `representations/rep1/metadata/descriptive/EAD_doc_File<N>.xml` |
//!
//! The structural documents record the size and digest of the other documents, which are not
//! known until those documents are written. Generation therefore runs in two phases: documents
//! are first rendered with [`Placeholder`] tokens, then [`backfill`] re-reads each referenced
//! file and substitutes the real values.

mod placeholders;
mod templates;

pub use placeholders::{backfill, backfill_plan, BackfillStep, Placeholder};
pub use templates::XmlTemplates;

use crate::config::AipConfig;
use crate::constants::{
    REP_DESCRIPTIVE_DIR, REP_METS_PATH, REP_PREMIS_PATH, ROOT_EAD_PATH, ROOT_PREMIS_PATH,
    METS_FILENAME,
};
use crate::model::{ContentFacts, Item, Record};
use crate::{AipError, AipResult};
use aip_types::Sha256Digest;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Package-level documents rendered from a [`PackageContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    RootMets,
    RepresentationMets,
    PackageEad,
    PackagePremis,
    RepresentationPremis,
}

impl DocumentKind {
    /// Package-relative output path.
    pub fn relative_path(self) -> &'static str {
        match self {
            DocumentKind::RootMets => METS_FILENAME,
            DocumentKind::RepresentationMets => REP_METS_PATH,
            DocumentKind::PackageEad => ROOT_EAD_PATH,
            DocumentKind::PackagePremis => ROOT_PREMIS_PATH,
            DocumentKind::RepresentationPremis => REP_PREMIS_PATH,
        }
    }

    /// Write order: documents referenced by others come first.
    pub const GENERATION_ORDER: [DocumentKind; 5] = [
        DocumentKind::PackageEad,
        DocumentKind::PackagePremis,
        DocumentKind::RepresentationPremis,
        DocumentKind::RepresentationMets,
        DocumentKind::RootMets,
    ];
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.relative_path())
    }
}

/// A reference schema staged into `schemas/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSchema {
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: Sha256Digest,
    /// True when the real schema was unavailable and a marker file was written instead
    pub placeholder: bool,
}

/// Everything a package-level document can draw on.
#[derive(Debug, Clone, Copy)]
pub struct PackageContext<'a> {
    pub record: &'a Record,
    pub config: &'a AipConfig,
    pub created_at: DateTime<Utc>,
    pub schemas: &'a [StagedSchema],
}

impl<'a> PackageContext<'a> {
    /// Items whose content was copied, with their post-copy facts.
    pub fn copied_items(&self) -> impl Iterator<Item = (&'a Item, &'a ContentFacts)> {
        self.record
            .items()
            .iter()
            .filter_map(|item| item.content().map(|facts| (item, facts)))
    }

    pub fn timestamp(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Everything an item descriptive document can draw on.
#[derive(Debug, Clone, Copy)]
pub struct ItemContext<'a> {
    pub record: &'a Record,
    pub item: &'a Item,
    pub facts: &'a ContentFacts,
    pub config: &'a AipConfig,
    pub created_at: DateTime<Utc>,
}

/// Turns a context into document text.
///
/// Implementations must be shareable across threads; item documents are rendered concurrently.
pub trait DocumentRenderer: Send + Sync {
    fn render_package(&self, kind: DocumentKind, context: &PackageContext<'_>) -> AipResult<String>;

    fn render_item(&self, context: &ItemContext<'_>) -> AipResult<String>;
}

/// Writes every metadata document of a package.
#[derive(Clone)]
pub struct MetadataGenerator {
    renderer: Arc<dyn DocumentRenderer>,
}

impl Default for MetadataGenerator {
    fn default() -> Self {
        Self::new(Arc::new(XmlTemplates))
    }
}

impl MetadataGenerator {
    pub fn new(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { renderer }
    }

    /// Phase one: render and write all documents, placeholders included.
    ///
    /// Item documents are rendered on scoped threads; the first failure aborts generation.
    ///
    /// # Returns
    ///
    /// Package-relative paths of the written documents.
    pub fn generate(&self, package_root: &Path, context: &PackageContext<'_>) -> AipResult<Vec<PathBuf>> {
        let mut written = self.generate_item_documents(package_root, context)?;

        for kind in DocumentKind::GENERATION_ORDER {
            let text = self.renderer.render_package(kind, context)?;
            write_document(package_root, Path::new(kind.relative_path()), &text)?;
            written.push(PathBuf::from(kind.relative_path()));
        }

        tracing::debug!(
            record_id = context.record.record_id(),
            documents = written.len(),
            "generated metadata documents"
        );
        Ok(written)
    }

    /// Phase two: substitute placeholder tokens. Safe to call repeatedly.
    pub fn backfill(&self, package_root: &Path, record: &Record) -> AipResult<usize> {
        backfill(package_root, &backfill_plan(record))
    }

    fn generate_item_documents(
        &self,
        package_root: &Path,
        context: &PackageContext<'_>,
    ) -> AipResult<Vec<PathBuf>> {
        let items: Vec<(&Item, &ContentFacts)> = context.copied_items().collect();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(items.len());
        let chunk_len = items.len().div_ceil(workers);

        let results: Vec<AipResult<Vec<PathBuf>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_len)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|(item, facts)| {
                                self.write_item_document(package_root, context, item, facts)
                            })
                            .collect::<AipResult<Vec<_>>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(AipError::Render {
                            document: "item descriptive document".into(),
                            reason: "renderer thread panicked".into(),
                        })
                    })
                })
                .collect()
        });

        let mut written = Vec::with_capacity(items.len());
        for result in results {
            written.extend(result?);
        }
        Ok(written)
    }

    fn write_item_document(
        &self,
        package_root: &Path,
        context: &PackageContext<'_>,
        item: &Item,
        facts: &ContentFacts,
    ) -> AipResult<PathBuf> {
        let item_context = ItemContext {
            record: context.record,
            item,
            facts,
            config: context.config,
            created_at: context.created_at,
        };
        let text = self.renderer.render_item(&item_context)?;
        let relative = Path::new(REP_DESCRIPTIVE_DIR).join(item.doc_descriptor_filename());
        write_document(package_root, &relative, &text)?;
        Ok(relative)
    }
}

fn write_document(package_root: &Path, relative: &Path, text: &str) -> AipResult<()> {
    let path = package_root.join(relative);
    fs::write(&path, text).map_err(|source| AipError::FileWrite {
        path: path.display().to_string(),
        source,
    })
}
