//! # AIP Core
//!
//! Core logic for assembling and validating Archival Information Packages.
//!
//! This crate contains pure data operations and package file management:
//! - Records manifest loading and record/item modelling
//! - Grouping of the content pool into per-record folders
//! - Two-phase metadata generation (METS, EAD, PREMIS) with placeholder backfill
//! - Package assembly and ZIP archiving
//! - Independent structural, referential and fixity validation
//! - Concurrent batch building on a bounded worker pool
//!
//! **No process concerns**: environment variables, CLI parsing and logging setup belong in the
//! `aip` binary. Everything here takes an explicit [`config::AipConfig`].
//!
//! ## Package layout
//!
//! ```text
//! <output>/<folder path>/<package name>/
//! ├── METS.xml
//! ├── metadata/
//! │   ├── descriptive/EAD.xml
//! │   └── preservation/PREMIS.xml
//! ├── representations/rep1/
//! │   ├── METS.xml
//! │   ├── data/<content files>
//! │   └── metadata/
//! │       ├── descriptive/EAD_doc_File<N>.xml
//! │       └── preservation/PREMIS_rep1.xml
//! └── schemas/{mets,ead,premis}.xsd
//! ```

pub mod batch;
pub mod builder;
pub mod config;
pub mod constants;
pub mod error;
pub mod grouping;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod text;
pub mod validator;
pub mod xml;

pub use error::{AipError, AipResult};

pub use aip_files::{ContentInspector, InspectionReport, PdfInspector};
pub use aip_types::Sha256Digest;
pub use aip_uuid::{AipUuid, ObjectId};
