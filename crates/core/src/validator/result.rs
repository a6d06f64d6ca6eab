//! Validation findings.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Ordered findings for one package.
///
/// Built up by the validator and sealed by [`ValidationResult::finalize`]; callers only read it.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    info: Vec<String>,
    checked_files: usize,
    total_size: u64,
    elapsed: Duration,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "validation error");
        self.errors.push(message);
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "validation warning");
        self.warnings.push(message);
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.info.push(message.into());
    }

    pub(crate) fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
    }

    pub(crate) fn finalize(mut self, checked_files: usize, total_size: u64, started: Instant) -> Self {
        self.checked_files = checked_files;
        self.total_size = total_size;
        self.elapsed = started.elapsed();
        self.is_valid = self.errors.is_empty();
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn info_messages(&self) -> &[String] {
        &self.info
    }

    pub fn checked_files(&self) -> usize {
        self.checked_files
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Results for every package under one directory, keyed by package directory name.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AggregateValidation {
    pub results: BTreeMap<String, ValidationResult>,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl AggregateValidation {
    pub(crate) fn insert(&mut self, name: String, result: ValidationResult) {
        self.total += 1;
        if result.is_valid() {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
        self.total_errors += result.errors().len();
        self.total_warnings += result.warnings().len();
        self.results.insert(name, result);
    }

    pub fn all_valid(&self) -> bool {
        self.invalid == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_follows_errors_only() {
        let mut result = ValidationResult::new();
        result.warning("orphan");
        result.info("ok");
        assert!(result.is_valid());

        result.error("dangling");
        let result = result.finalize(3, 100, Instant::now());
        assert!(!result.is_valid());
        assert_eq!(result.checked_files(), 3);
        assert_eq!(result.total_size(), 100);
    }

    #[test]
    fn test_aggregate_counts() {
        let mut aggregate = AggregateValidation::default();
        let mut bad = ValidationResult::new();
        bad.error("x");
        bad.warning("y");
        aggregate.insert("a".into(), ValidationResult::new());
        aggregate.insert("b".into(), bad);

        assert_eq!(aggregate.total, 2);
        assert_eq!(aggregate.valid, 1);
        assert_eq!(aggregate.invalid, 1);
        assert_eq!(aggregate.total_errors, 1);
        assert_eq!(aggregate.total_warnings, 1);
        assert!(!aggregate.all_valid());
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_value(ValidationResult::new()).unwrap();
        assert!(json["errors"].as_array().unwrap().is_empty());
        assert_eq!(json["checked_files"], 0);
    }
}
