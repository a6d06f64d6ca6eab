//! Content inspection.
//!
//! The builder asks a [`ContentInspector`] about each copied file so it can record page counts and
//! flag encrypted documents. [`PdfInspector`] parses the document with `lopdf`, so pages held in
//! compressed object streams are counted and text inside content streams is never mistaken for
//! document structure.

use crate::constants::PDF_MAGIC;
use crate::hashing::sha256_file;
use crate::media::{detect_media_type, read_header};
use aip_types::Sha256Digest;
use lopdf::{Document, Object};
use std::path::Path;

/// Facts gathered about one content file.
///
/// Inspection never fails outright: problems are carried in [`InspectionReport::error`] and the
/// remaining fields hold whatever could be determined.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InspectionReport {
    pub size_bytes: u64,
    pub sha256: Option<Sha256Digest>,
    pub page_count: Option<u32>,
    pub is_encrypted: bool,
    pub has_extractable_text: bool,
    pub media_type: Option<String>,
    pub error: Option<String>,
}

/// Inspects a content file.
///
/// Implementations must be shareable across worker threads.
pub trait ContentInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> InspectionReport;
}

/// PDF inspector backed by `lopdf`.
///
/// - Page count: leaves of the page tree
/// - Encryption: an `/Encrypt` entry in the trailer
/// - Text: any font dictionary or `/Font` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfInspector;

impl ContentInspector for PdfInspector {
    fn inspect(&self, path: &Path) -> InspectionReport {
        let (size_bytes, sha256) = match sha256_file(path) {
            Ok(facts) => facts,
            Err(e) => {
                return InspectionReport {
                    error: Some(e.to_string()),
                    ..InspectionReport::default()
                };
            }
        };

        let mut report = InspectionReport {
            size_bytes,
            sha256: Some(sha256),
            ..InspectionReport::default()
        };

        match detect_media_type(path) {
            Ok(media_type) => report.media_type = media_type.map(str::to_owned),
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        }

        match read_header(path) {
            Ok(header) if header.starts_with(PDF_MAGIC) => {}
            Ok(_) => {
                report.error = Some("missing %PDF- header".into());
                return report;
            }
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        }

        match Document::load(path) {
            Ok(document) => {
                let pages = document.get_pages().len();
                report.page_count = u32::try_from(pages).ok().filter(|n| *n > 0);
                report.is_encrypted = document.is_encrypted();
                report.has_extractable_text = has_fonts(&document);
            }
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "failed to parse PDF");
                report.error = Some(format!("unreadable PDF: {}", e));
            }
        }
        report
    }
}

fn has_fonts(document: &Document) -> bool {
    document.objects.values().any(|object| {
        object.as_dict().map_or(false, |dict| {
            dict.has(b"Font")
                || dict
                    .get(b"Type")
                    .and_then(Object::as_name)
                    .map_or(false, |name| name == b"Font")
        })
    })
}
