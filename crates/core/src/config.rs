//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then passed
//! into the grouper, builder, validator and batch coordinator. Nothing in the core reads
//! environment variables, so two builds in one process can run with different settings.

use crate::constants::{
    DEFAULT_AGENT_NAME, DEFAULT_AGENT_VERSION, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_PER_RECORD_SECS,
    MAX_WORKERS_CAP, SCHEMAS_DIR, SCHEMA_FILES,
};
use crate::{AipError, AipResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Package-building configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct AipConfig {
    organization_name: String,
    agency_code: Option<String>,
    agent_name: String,
    agent_version: String,
    schema_dir: Option<PathBuf>,
    cleanup_after_archive: bool,
}

impl AipConfig {
    /// Create a new `AipConfig` with the default software agent and no schema directory.
    ///
    /// A blank agency code is treated as absent.
    pub fn new(organization_name: impl Into<String>, agency_code: Option<String>) -> AipResult<Self> {
        let organization_name = organization_name.into();
        if organization_name.trim().is_empty() {
            return Err(AipError::InvalidConfig(
                "organization_name cannot be empty".into(),
            ));
        }

        let agency_code = agency_code
            .map(|code| code.trim().to_owned())
            .filter(|code| !code.is_empty());
        if let Some(code) = &agency_code {
            // Record construction assumes a URN-safe agency code.
            aip_uuid::ObjectId::new(Some(code))?;
        }

        Ok(Self {
            organization_name,
            agency_code,
            agent_name: DEFAULT_AGENT_NAME.into(),
            agent_version: DEFAULT_AGENT_VERSION.into(),
            schema_dir: None,
            cleanup_after_archive: false,
        })
    }

    /// Override the software agent recorded in headers and preservation events.
    pub fn with_agent(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> AipResult<Self> {
        let name = name.into();
        let version = version.into();
        if name.trim().is_empty() || version.trim().is_empty() {
            return Err(AipError::InvalidConfig(
                "agent name and version cannot be empty".into(),
            ));
        }
        self.agent_name = name;
        self.agent_version = version;
        Ok(self)
    }

    /// Set the directory reference schemas are staged from.
    pub fn with_schema_dir(mut self, schema_dir: Option<PathBuf>) -> Self {
        self.schema_dir = schema_dir;
        self
    }

    /// Remove each package's working directory once its archive has been written.
    pub fn with_cleanup(mut self, cleanup_after_archive: bool) -> Self {
        self.cleanup_after_archive = cleanup_after_archive;
        self
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    pub fn agency_code(&self) -> Option<&str> {
        self.agency_code.as_deref()
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn agent_version(&self) -> &str {
        &self.agent_version
    }

    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

    pub fn cleanup_after_archive(&self) -> bool {
        self.cleanup_after_archive
    }
}

/// Batch coordinator settings.
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Number of chunks processed concurrently.
    pub max_workers: usize,
    /// Records per chunk.
    pub chunk_size: usize,
    /// Time budget per record; the wait for in-flight chunks scales with their record count.
    pub timeout_per_record: Duration,
    /// Keep submitting chunks after a record fails.
    pub continue_on_error: bool,
    /// Validate each successfully built package before cleanup.
    pub validate_after_build: bool,
    /// Build only the first `limit` records handed to a run.
    pub limit: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_per_record: Duration::from_secs(DEFAULT_TIMEOUT_PER_RECORD_SECS),
            continue_on_error: true,
            validate_after_build: true,
            limit: None,
        }
    }
}

impl BatchOptions {
    /// Check the options describe a runnable pool.
    pub fn validate(&self) -> AipResult<()> {
        if self.max_workers == 0 {
            return Err(AipError::InvalidConfig("max_workers must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(AipError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.timeout_per_record.is_zero() {
            return Err(AipError::InvalidConfig(
                "timeout_per_record must be positive".into(),
            ));
        }
        if self.limit == Some(0) {
            return Err(AipError::InvalidConfig("limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Twice the available cores, capped at [`MAX_WORKERS_CAP`].
pub fn default_max_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 2).clamp(1, MAX_WORKERS_CAP)
}

/// Resolve the reference schema directory without reading environment variables.
///
/// If `override_dir` is provided it must be a directory. Otherwise `schemas/` relative to the
/// current working directory is used when it contains at least one of the reference schemas.
/// Returning `None` is not an error: packages then carry placeholder schema files.
pub fn resolve_schema_dir(override_dir: Option<PathBuf>) -> AipResult<Option<PathBuf>> {
    fn has_any_schema(path: &Path) -> bool {
        SCHEMA_FILES.iter().any(|name| path.join(name).is_file())
    }

    if let Some(dir) = override_dir {
        if dir.is_dir() {
            return Ok(Some(dir));
        }
        return Err(AipError::InvalidConfig(format!(
            "schema directory override is not a directory: {}",
            dir.display()
        )));
    }

    let cwd_relative = PathBuf::from(SCHEMAS_DIR);
    if cwd_relative.is_dir() && has_any_schema(&cwd_relative) {
        return Ok(Some(cwd_relative));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_blank_organization() {
        assert!(matches!(
            AipConfig::new("  ", None),
            Err(AipError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_normalises_agency_code() {
        let config = AipConfig::new("Org", Some("  HTJSC ".into())).unwrap();
        assert_eq!(config.agency_code(), Some("HTJSC"));

        let config = AipConfig::new("Org", Some("   ".into())).unwrap();
        assert_eq!(config.agency_code(), None);
    }

    #[test]
    fn test_new_rejects_unsafe_agency_code() {
        assert!(AipConfig::new("Org", Some("a:b".into())).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = AipConfig::new("Org", None).unwrap();

        assert_eq!(config.agent_name(), DEFAULT_AGENT_NAME);
        assert_eq!(config.agent_version(), DEFAULT_AGENT_VERSION);
        assert!(config.schema_dir().is_none());
        assert!(!config.cleanup_after_archive());
    }

    #[test]
    fn test_with_agent_rejects_blank() {
        let config = AipConfig::new("Org", None).unwrap();
        assert!(config.with_agent("", "1.0").is_err());
    }

    #[test]
    fn test_batch_options_default_is_valid() {
        let options = BatchOptions::default();

        assert!(options.validate().is_ok());
        assert!(options.max_workers >= 1 && options.max_workers <= MAX_WORKERS_CAP);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_batch_options_rejects_zero_chunk() {
        let options = BatchOptions {
            chunk_size: 0,
            ..BatchOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_batch_options_rejects_zero_limit() {
        let options = BatchOptions {
            limit: Some(0),
            ..BatchOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_resolve_schema_dir_override() {
        let temp = TempDir::new().unwrap();
        let resolved = resolve_schema_dir(Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(resolved.as_deref(), Some(temp.path()));

        let missing = temp.path().join("missing");
        assert!(resolve_schema_dir(Some(missing)).is_err());
    }
}
