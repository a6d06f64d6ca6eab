use super::identifiers::ItemIdentifiers;
use crate::constants::ITEM_EAD_PREFIX;
use crate::{AipError, AipResult};
use aip_types::Sha256Digest;
use std::path::{Path, PathBuf};

/// Descriptive attributes of one content file, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ItemDescription {
    pub document_code: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub document_date: Option<String>,
    pub document_type: Option<String>,
    pub language: Option<String>,
    pub notes: Option<String>,
    pub page_count: Option<u32>,
}

/// Facts about the copied content file, filled in by the package builder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContentFacts {
    /// Name inside the data directory; differs from the source name after disambiguation
    pub final_filename: String,
    pub size_bytes: u64,
    pub sha256: Sha256Digest,
    pub page_count: Option<u32>,
}

/// One physical content file belonging to a record.
#[derive(Debug, Clone)]
pub struct Item {
    sequence_number: u32,
    source_relative_path: PathBuf,
    identifiers: ItemIdentifiers,
    doc_descriptor_filename: String,
    description: ItemDescription,
    content: Option<ContentFacts>,
}

impl Item {
    /// Create an item. Its identifiers and descriptive-document filename are fixed here.
    ///
    /// # Errors
    ///
    /// Returns [`AipError::InvalidInput`] if `sequence_number` is zero.
    pub fn new(
        sequence_number: u32,
        source_relative_path: impl Into<PathBuf>,
        description: ItemDescription,
    ) -> AipResult<Self> {
        if sequence_number == 0 {
            return Err(AipError::InvalidInput(
                "item sequence numbers are 1-based".into(),
            ));
        }

        Ok(Self {
            sequence_number,
            source_relative_path: source_relative_path.into(),
            identifiers: ItemIdentifiers::generate(),
            doc_descriptor_filename: format!("{}{}.xml", ITEM_EAD_PREFIX, sequence_number),
            description,
            content: None,
        })
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn source_relative_path(&self) -> &Path {
        &self.source_relative_path
    }

    pub fn identifiers(&self) -> &ItemIdentifiers {
        &self.identifiers
    }

    pub fn doc_descriptor_filename(&self) -> &str {
        &self.doc_descriptor_filename
    }

    pub fn description(&self) -> &ItemDescription {
        &self.description
    }

    pub fn content(&self) -> Option<&ContentFacts> {
        self.content.as_ref()
    }

    /// Source file name, used as a fallback title and document code.
    pub fn source_filename(&self) -> String {
        self.source_relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Title, else the source file name.
    pub fn effective_title(&self) -> String {
        self.description
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.source_filename())
    }

    /// Page count from the description, else from the copied content.
    pub fn page_count(&self) -> Option<u32> {
        self.description
            .page_count
            .or_else(|| self.content.as_ref().and_then(|c| c.page_count))
    }

    /// Record post-copy facts. A known page count is never overwritten by an inspected one.
    pub(crate) fn record_content(&mut self, mut facts: ContentFacts) {
        if self.description.page_count.is_some() {
            facts.page_count = self.description.page_count;
        }
        self.content = Some(facts);
    }

    /// Forget post-copy facts so a rebuild starts clean.
    pub(crate) fn clear_content(&mut self) {
        self.content = None;
    }
}
