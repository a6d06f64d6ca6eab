#[derive(Debug, thiserror::Error)]
pub enum AipError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pool root not found: {0}")]
    PoolRootNotFound(String),
    #[error("non-contiguous item sequence in record {record_id}: has {actual:?}, expected {expected:?}")]
    NonContiguousSequence {
        record_id: String,
        actual: Vec<u32>,
        expected: Vec<u32>,
    },
    #[error("failed to create directory {path}: {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no content files could be copied for record {0}")]
    NoContentCopied(String),
    #[error("failed to render {document}: {reason}")]
    Render { document: String, reason: String },
    #[error("placeholder {token} left unresolved in {path}")]
    UnresolvedPlaceholder { token: String, path: String },
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("file error: {0}")]
    Files(#[from] aip_files::FilesError),
    #[error("identifier error: {0}")]
    Uuid(#[from] aip_uuid::UuidError),
    #[error("text error: {0}")]
    Text(#[from] aip_types::TextError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AipResult<T> = std::result::Result<T, AipError>;
