//! Records manifest loading.
//!
//! Records are described in a YAML (or JSON) document:
//!
//! ```yaml
//! records:
//!   - record_id: "1"
//!     paper_file_code: CODE123
//!     title: Hồ sơ cấp phép
//!     organization_name: Chi cục Thú y
//!     date_range_start: "2019-01-01"
//!     date_range_end: "2019-12-31"
//!     items:                      # optional, normally attached by the grouper
//!       - sequence_number: 1
//!         source: hoso01/CODE123.1.pdf
//!         title: Đơn đề nghị
//! ```
//!
//! Every descriptive column is optional. Record ids must be unique within one manifest.

use crate::config::AipConfig;
use crate::model::{Item, ItemDescription, Record, RecordDescription};
use crate::{AipError, AipResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    records: Vec<RecordEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct RecordEntry {
    record_id: String,
    #[serde(default)]
    paper_file_code: Option<String>,
    #[serde(default)]
    original_folder_path: Option<PathBuf>,
    #[serde(default)]
    items: Vec<ItemEntry>,
    #[serde(flatten)]
    description: RecordDescription,
}

#[derive(Debug, serde::Deserialize)]
struct ItemEntry {
    sequence_number: u32,
    source: PathBuf,
    #[serde(flatten)]
    description: ItemDescription,
}

/// Load records from a manifest file.
///
/// # Errors
///
/// Returns `AipError` if:
/// - the file cannot be read
/// - the document does not deserialize
/// - a record is invalid (blank id, non-contiguous inline items)
pub fn load_records(path: &Path, config: &AipConfig) -> AipResult<Vec<Record>> {
    let text = fs::read_to_string(path).map_err(|source| AipError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    parse_records(&text, config)
}

/// Parse records from manifest text.
pub fn parse_records(text: &str, config: &AipConfig) -> AipResult<Vec<Record>> {
    let manifest: Manifest = serde_yaml::from_str(text).map_err(AipError::YamlDeserialization)?;

    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::with_capacity(manifest.records.len());
    for entry in manifest.records {
        if !seen.insert(entry.record_id.trim().to_owned()) {
            return Err(AipError::InvalidInput(format!(
                "duplicate record_id '{}'",
                entry.record_id
            )));
        }

        let mut record = Record::new(
            &entry.record_id,
            entry.paper_file_code.as_deref(),
            entry.description,
            config.agency_code(),
        )?;
        if let Some(folder) = entry.original_folder_path {
            record.set_original_folder_path(folder);
        }
        if !entry.items.is_empty() {
            let items = entry
                .items
                .into_iter()
                .map(|item| Item::new(item.sequence_number, item.source, item.description))
                .collect::<AipResult<Vec<_>>>()?;
            record.attach_items(items)?;
        }
        records.push(record);
    }

    tracing::info!(count = records.len(), "loaded records from manifest");
    Ok(records)
}
