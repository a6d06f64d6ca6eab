use super::identifiers::RecordIdentifiers;
use super::item::Item;
use crate::constants::DEFAULT_LANGUAGE;
use crate::text::normalize_code;
use crate::{AipError, AipResult};
use aip_types::NonEmptyText;
use aip_uuid::ObjectId;
use std::path::{Path, PathBuf};

/// Descriptive attributes of a record, all optional.
///
/// Field names follow the archival description columns records are loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RecordDescription {
    pub organization_code: Option<String>,
    pub organization_name: Option<String>,
    pub box_code: Option<String>,
    pub box_title: Option<String>,
    pub file_code: Option<String>,
    pub title: Option<String>,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub sheet_count: Option<u32>,
    pub page_count: Option<u32>,
    pub notes: Option<String>,
    pub access_condition: Option<String>,
    pub retention_class: Option<String>,
    pub language: Option<String>,
    pub script: Option<String>,
    pub physical_condition: Option<String>,
    pub physical_characteristics: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub provenance: Option<String>,
    pub rules: Option<String>,
    pub digitization_date: Option<String>,
    pub digitized_by: Option<String>,
}

/// A logical archival unit that becomes one package.
#[derive(Debug, Clone)]
pub struct Record {
    record_id: NonEmptyText,
    object_id: ObjectId,
    paper_file_code: String,
    paper_file_code_supplied: bool,
    description: RecordDescription,
    items: Vec<Item>,
    original_folder_path: Option<PathBuf>,
    identifiers: RecordIdentifiers,
}

impl Record {
    /// Create a record and allocate all of its identifiers.
    ///
    /// When `paper_file_code` is absent it is derived from the organization name, then the
    /// title, then the record id, each passed through [`normalize_code`].
    ///
    /// # Errors
    ///
    /// Returns `AipError` if the record id is blank or the agency code is not URN-safe.
    pub fn new(
        record_id: impl AsRef<str>,
        paper_file_code: Option<&str>,
        description: RecordDescription,
        agency_code: Option<&str>,
    ) -> AipResult<Self> {
        let record_id = NonEmptyText::new(record_id)?;
        let object_id = ObjectId::new(agency_code)?;

        let supplied = paper_file_code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_owned);
        let paper_file_code_supplied = supplied.is_some();
        let paper_file_code = supplied.unwrap_or_else(|| {
            [
                description.organization_name.as_deref(),
                description.title.as_deref(),
                Some(record_id.as_str()),
            ]
            .into_iter()
            .flatten()
            .map(normalize_code)
            .find(|code| !code.is_empty())
            .unwrap_or_else(|| record_id.as_str().to_owned())
        });

        Ok(Self {
            record_id,
            object_id,
            paper_file_code,
            paper_file_code_supplied,
            description,
            items: Vec::new(),
            original_folder_path: None,
            identifiers: RecordIdentifiers::generate(),
        })
    }

    pub fn record_id(&self) -> &str {
        self.record_id.as_str()
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn paper_file_code(&self) -> &str {
        &self.paper_file_code
    }

    /// True when the paper-file code came from the input rather than being derived.
    pub fn paper_file_code_supplied(&self) -> bool {
        self.paper_file_code_supplied
    }

    pub fn description(&self) -> &RecordDescription {
        &self.description
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn identifiers(&self) -> &RecordIdentifiers {
        &self.identifiers
    }

    pub fn original_folder_path(&self) -> Option<&Path> {
        self.original_folder_path.as_deref()
    }

    pub fn set_original_folder_path(&mut self, path: impl Into<PathBuf>) {
        self.original_folder_path = Some(path.into());
    }

    /// Replace a derived paper-file code. A supplied code is never overwritten.
    pub fn adopt_paper_file_code(&mut self, code: &str) {
        if !self.paper_file_code_supplied && !code.trim().is_empty() {
            self.paper_file_code = code.trim().to_owned();
        }
    }

    /// Attach items, ordered by sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`AipError::NonContiguousSequence`] unless the sequence numbers are exactly
    /// `1..=N`. The record keeps its previous items in that case.
    pub fn attach_items(&mut self, mut items: Vec<Item>) -> AipResult<()> {
        items.sort_by_key(Item::sequence_number);

        let actual: Vec<u32> = items.iter().map(Item::sequence_number).collect();
        let expected: Vec<u32> = (1..=items.len() as u32).collect();
        if actual != expected {
            return Err(AipError::NonContiguousSequence {
                record_id: self.record_id.to_string(),
                actual,
                expected,
            });
        }

        self.items = items;
        Ok(())
    }

    /// Title, else box title, else `Hồ sơ <paper-file code>`.
    pub fn effective_title(&self) -> String {
        non_blank(&self.description.title)
            .or_else(|| non_blank(&self.description.box_title))
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Hồ sơ {}", self.paper_file_code))
    }

    /// Material language, defaulting to Vietnamese.
    pub fn effective_language(&self) -> &str {
        non_blank(&self.description.language).unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Organization name, else the configured default.
    pub fn effective_organization<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_blank(&self.description.organization_name).unwrap_or(fallback)
    }

    /// ISO 8601 style interval `start/end`; a single bound when only one is known.
    pub fn date_range(&self) -> Option<String> {
        match (
            non_blank(&self.description.date_range_start),
            non_blank(&self.description.date_range_end),
        ) {
            (Some(start), Some(end)) => Some(format!("{}/{}", start, end)),
            (Some(start), None) => Some(start.to_owned()),
            (None, Some(end)) => Some(end.to_owned()),
            (None, None) => None,
        }
    }

    /// Total page count: the record's own value, else the sum over items when all are known.
    pub fn total_pages(&self) -> Option<u32> {
        if self.description.page_count.is_some() {
            return self.description.page_count;
        }
        self.items
            .iter()
            .map(Item::page_count)
            .sum::<Option<u32>>()
            .filter(|_| !self.items.is_empty())
    }

    /// Directory and archive base name: the object identifier with `:` replaced.
    pub fn package_name(&self) -> String {
        self.object_id.filesystem_name()
    }

    /// Output sub-directory the package is placed under.
    ///
    /// Mirrors the source folder (separators normalised to `/`, `:` replaced, no leading `/`),
    /// else the paper-file code.
    pub fn folder_path(&self) -> String {
        let from_source = self.original_folder_path.as_ref().map(|path| {
            path.to_string_lossy()
                .replace('\\', "/")
                .replace(':', "_")
                .trim_start_matches('/')
                .to_owned()
        });
        match from_source {
            Some(path) if !path.is_empty() => path,
            _ => normalize_code(&self.paper_file_code),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
