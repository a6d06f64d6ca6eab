//! Constants used throughout the AIP core crate.
//!
//! This module contains the package layout, document names, XML namespaces and operational
//! defaults so the builder and the validator agree on every path they touch.

/// Filename of the structural document at the package root and in each representation.
pub const METS_FILENAME: &str = "METS.xml";

/// Filename of the package-level descriptive document.
pub const EAD_FILENAME: &str = "EAD.xml";

/// Filename of the package-level preservation document.
pub const PREMIS_FILENAME: &str = "PREMIS.xml";

/// Filename of the representation-level preservation document.
pub const REP_PREMIS_FILENAME: &str = "PREMIS_rep1.xml";

/// Prefix of per-item descriptive document filenames (`EAD_doc_File<N>.xml`).
pub const ITEM_EAD_PREFIX: &str = "EAD_doc_File";

/// Name of the single representation inside a package.
pub const REPRESENTATION_NAME: &str = "rep1";

/// Package-relative path of the descriptive metadata directory.
pub const DESCRIPTIVE_DIR: &str = "metadata/descriptive";

/// Package-relative path of the preservation metadata directory.
pub const PRESERVATION_DIR: &str = "metadata/preservation";

/// Package-relative path of the schema directory.
pub const SCHEMAS_DIR: &str = "schemas";

/// Package-relative path of the representation directory.
pub const REP_DIR: &str = "representations/rep1";

/// Package-relative path of the content data directory.
pub const REP_DATA_DIR: &str = "representations/rep1/data";

/// Package-relative path of the representation descriptive metadata directory.
pub const REP_DESCRIPTIVE_DIR: &str = "representations/rep1/metadata/descriptive";

/// Package-relative path of the representation preservation metadata directory.
pub const REP_PRESERVATION_DIR: &str = "representations/rep1/metadata/preservation";

/// Package-relative path of the package-level descriptive document.
pub const ROOT_EAD_PATH: &str = "metadata/descriptive/EAD.xml";

/// Package-relative path of the package-level preservation document.
pub const ROOT_PREMIS_PATH: &str = "metadata/preservation/PREMIS.xml";

/// Package-relative path of the representation structural document.
pub const REP_METS_PATH: &str = "representations/rep1/METS.xml";

/// Package-relative path of the representation preservation document.
pub const REP_PREMIS_PATH: &str = "representations/rep1/metadata/preservation/PREMIS_rep1.xml";

/// Prefix every content file reference in the root structural document starts with.
pub const CONTENT_HREF_PREFIX: &str = "representations/rep1/data/";

/// Directories every package must contain, relative to the package root.
pub const REQUIRED_DIRECTORIES: [&str; 10] = [
    "metadata",
    DESCRIPTIVE_DIR,
    PRESERVATION_DIR,
    "representations",
    REP_DIR,
    REP_DATA_DIR,
    "representations/rep1/metadata",
    REP_DESCRIPTIVE_DIR,
    REP_PRESERVATION_DIR,
    SCHEMAS_DIR,
];

/// Reference schema files staged into every package.
pub const SCHEMA_FILES: [&str; 3] = ["mets.xsd", "ead.xsd", "premis.xsd"];

/// METS namespace.
pub const METS_NS: &str = "http://www.loc.gov/METS/";

/// CSIP METS extension namespace.
pub const CSIP_NS: &str = "https://DILCIS.eu/XML/METS/CSIPExtensionMETS";

/// EAD 2002 namespace.
pub const EAD_NS: &str = "urn:isbn:1-931666-22-9";

/// PREMIS 3 namespace.
pub const PREMIS_NS: &str = "http://www.loc.gov/premis/v3";

/// XLink namespace.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// XML Schema instance namespace.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// CSIP profile declared on every structural document.
pub const CSIP_PROFILE: &str = "https://earkcsip.dilcis.eu/profile/E-ARK-CSIP.xml";

/// Content category declared in the structural document `TYPE` attribute.
pub const PACKAGE_CONTENT_TYPE: &str = "Textual works - Print";

/// PREMIS version written into and expected from preservation documents.
pub const PREMIS_VERSION: &str = "3.0";

/// The only checksum algorithm produced and verified.
pub const CHECKSUM_TYPE: &str = "SHA-256";

/// Digest value meaning "not computed"; skipped during checksum verification.
pub const UNCALCULATED_DIGEST: &str = "[TO_BE_CALCULATED]";

/// Default holding organization recorded as package creator.
pub const DEFAULT_ORGANIZATION_NAME: &str = "Công ty cổ phần công nghệ Lưu trữ - Số hóa HT";

/// Default agency code used in object identifiers.
pub const DEFAULT_AGENCY_CODE: &str = "HTJSC";

/// Default software agent recorded in headers and preservation events.
pub const DEFAULT_AGENT_NAME: &str = "AIP Builder System";

/// Default software agent version.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

/// Default material language (ISO 639-2).
pub const DEFAULT_LANGUAGE: &str = "vie";

/// Media type recorded for content files.
pub const CONTENT_MEDIA_TYPE: &str = "application/pdf";

/// Format name recorded for content files.
pub const CONTENT_FORMAT_NAME: &str = "Portable Document Format";

/// Maximum length of a derived paper-file code.
pub const MAX_CODE_LEN: usize = 100;

/// Default number of records per batch chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Upper bound on batch workers regardless of core count.
pub const MAX_WORKERS_CAP: usize = 8;

/// Default per-record timeout in seconds.
pub const DEFAULT_TIMEOUT_PER_RECORD_SECS: u64 = 300;

/// Number of error strings carried in a batch report display.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Maximum characters kept per reported error string.
pub const MAX_REPORTED_ERROR_LEN: usize = 300;

/// Directory name prefix for timestamped output directories.
pub const OUTPUT_DIR_PREFIX: &str = "output_";
