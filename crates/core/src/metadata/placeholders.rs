//! Placeholder tokens and their substitution.
//!
//! Structural documents are rendered before the documents they reference exist, so each
//! reference carries a `PLACEHOLDER_<NAME>_SIZE` / `PLACEHOLDER_<NAME>_CHECKSUM` token pair.
//! [`backfill`] hashes the referenced file and rewrites the tokens in place.
//!
//! The representation structural document is itself referenced from the root document, so it
//! must be backfilled first; [`backfill_plan`] returns the steps in that order.

use crate::constants::{
    METS_FILENAME, REP_DESCRIPTIVE_DIR, REP_METS_PATH, REP_PREMIS_PATH, ROOT_EAD_PATH,
    ROOT_PREMIS_PATH,
};
use crate::model::Record;
use crate::{AipError, AipResult};
use aip_files::sha256_file;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const TOKEN_PREFIX: &str = "PLACEHOLDER_";

/// A referenced document whose size and digest are filled in after writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    PackageEad,
    PackagePremis,
    RepresentationMets,
    RepresentationPremis,
    /// Item descriptive document, by item sequence number
    ItemEad(u32),
}

impl Placeholder {
    /// Package-relative path of the referenced document.
    pub fn target(&self) -> PathBuf {
        match self {
            Placeholder::PackageEad => PathBuf::from(ROOT_EAD_PATH),
            Placeholder::PackagePremis => PathBuf::from(ROOT_PREMIS_PATH),
            Placeholder::RepresentationMets => PathBuf::from(REP_METS_PATH),
            Placeholder::RepresentationPremis => PathBuf::from(REP_PREMIS_PATH),
            Placeholder::ItemEad(seq) => {
                Path::new(REP_DESCRIPTIVE_DIR).join(format!("EAD_doc_File{}.xml", seq))
            }
        }
    }

    fn stem(&self) -> String {
        match self {
            Placeholder::PackageEad => "EAD".into(),
            Placeholder::PackagePremis => "PREMIS".into(),
            Placeholder::RepresentationMets => "REP_METS".into(),
            Placeholder::RepresentationPremis => "PREMIS_REP".into(),
            Placeholder::ItemEad(seq) => format!("EAD_DOC_{}", seq),
        }
    }

    pub fn size_token(&self) -> String {
        format!("{}{}_SIZE", TOKEN_PREFIX, self.stem())
    }

    pub fn checksum_token(&self) -> String {
        format!("{}{}_CHECKSUM", TOKEN_PREFIX, self.stem())
    }
}

/// One document to rewrite and the placeholders it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillStep {
    /// Package-relative path of the document holding the tokens
    pub document: PathBuf,
    pub placeholders: Vec<Placeholder>,
}

/// Ordered substitution steps for a record's package.
///
/// Only items with copied content have descriptive documents, so only those get a step entry.
pub fn backfill_plan(record: &Record) -> Vec<BackfillStep> {
    let mut representation = vec![Placeholder::RepresentationPremis];
    representation.extend(
        record
            .items()
            .iter()
            .filter(|item| item.content().is_some())
            .map(|item| Placeholder::ItemEad(item.sequence_number())),
    );

    vec![
        BackfillStep {
            document: PathBuf::from(REP_METS_PATH),
            placeholders: representation,
        },
        BackfillStep {
            document: PathBuf::from(METS_FILENAME),
            placeholders: vec![
                Placeholder::PackageEad,
                Placeholder::PackagePremis,
                Placeholder::RepresentationMets,
            ],
        },
    ]
}

/// Substitute every placeholder in `plan`, in order.
///
/// Tokens are only recognised as the whole value of a `SIZE` or `CHECKSUM` attribute, so
/// descriptive text that happens to spell a token is left alone. A document is rewritten only
/// when at least one token was replaced, so running this on an already backfilled package
/// changes nothing.
///
/// # Returns
///
/// The number of tokens replaced.
///
/// # Errors
///
/// Returns `AipError` if:
/// - a document or referenced file cannot be read
/// - a document cannot be written back or is not well-formed
/// - a `SIZE` or `CHECKSUM` attribute still holds a token after substitution
pub fn backfill(package_root: &Path, plan: &[BackfillStep]) -> AipResult<usize> {
    let mut replaced = 0;

    for step in plan {
        let path = package_root.join(&step.document);
        let original = fs::read_to_string(&path).map_err(|source| AipError::FileRead {
            path: path.display().to_string(),
            source,
        })?;

        let mut values = HashMap::new();
        for placeholder in &step.placeholders {
            let size_token = placeholder.size_token();
            let checksum_token = placeholder.checksum_token();
            if !original.contains(&size_token) && !original.contains(&checksum_token) {
                continue;
            }
            let (size, digest) = sha256_file(&package_root.join(placeholder.target()))?;
            values.insert(size_token, size.to_string());
            values.insert(checksum_token, digest.as_str().to_owned());
        }

        let (text, count) = substitute(&original, &values).map_err(|e| match e {
            AipError::UnresolvedPlaceholder { token, .. } => AipError::UnresolvedPlaceholder {
                token,
                path: step.document.display().to_string(),
            },
            other => other,
        })?;

        if count > 0 {
            fs::write(&path, &text).map_err(|source| AipError::FileWrite {
                path: path.display().to_string(),
                source,
            })?;
            replaced += count;
            tracing::debug!(document = %step.document.display(), count, "backfilled placeholders");
        }
    }

    Ok(replaced)
}

fn is_token_attribute(key: &[u8]) -> bool {
    key == b"SIZE" || key == b"CHECKSUM"
}

/// Rewrite token-valued `SIZE`/`CHECKSUM` attributes, copying every other event through as is.
fn substitute(text: &str, values: &HashMap<String, String>) -> AipResult<(String, usize)> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut count = 0;

    loop {
        let event = reader.read_event().map_err(|e| AipError::Xml(e.to_string()))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(start) => Event::Start(rewrite_attributes(start, values, &mut count)?),
            Event::Empty(start) => Event::Empty(rewrite_attributes(start, values, &mut count)?),
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| AipError::Xml(e.to_string()))?;
    }

    let text = String::from_utf8(writer.into_inner()).map_err(|e| AipError::Xml(e.to_string()))?;
    Ok((text, count))
}

fn rewrite_attributes<'a>(
    start: BytesStart<'a>,
    values: &HashMap<String, String>,
    count: &mut usize,
) -> AipResult<BytesStart<'a>> {
    let holds_token = start.attributes().flatten().any(|attr| {
        is_token_attribute(attr.key.local_name().as_ref())
            && attr.value.starts_with(TOKEN_PREFIX.as_bytes())
    });
    if !holds_token {
        return Ok(start);
    }

    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| AipError::Xml(e.to_string()))?;
        if !is_token_attribute(attr.key.local_name().as_ref()) {
            rewritten.push_attribute(attr);
            continue;
        }

        let value = attr
            .unescape_value()
            .map_err(|e| AipError::Xml(e.to_string()))?
            .into_owned();
        if !value.starts_with(TOKEN_PREFIX) {
            rewritten.push_attribute(attr);
            continue;
        }
        match values.get(&value) {
            Some(replacement) => {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                rewritten.push_attribute((key.as_str(), replacement.as_str()));
                *count += 1;
            }
            None => {
                return Err(AipError::UnresolvedPlaceholder {
                    token: value,
                    path: String::new(),
                })
            }
        }
    }
    Ok(rewritten.into_owned())
}
