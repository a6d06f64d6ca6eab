//! Concurrent package building for many records.
//!
//! Records are split into chunks of [`BatchOptions::chunk_size`]. Each chunk runs on one
//! blocking worker and at most [`BatchOptions::max_workers`] chunks are in flight. Workers never
//! share output paths: every record writes only its own package subtree.
//!
//! Submission stops when a stop is requested through a [`StopHandle`], when a wait for results
//! times out, or (unless `continue_on_error`) after the first failed record. Chunks already in
//! flight always run to completion.

mod progress;

pub use progress::{estimate_remaining, ProgressEvent, ProgressMonitor, ProgressSink};

use crate::builder::{PackageBuildResult, PackageBuilder};
use crate::config::BatchOptions;
use crate::constants::{MAX_REPORTED_ERRORS, MAX_REPORTED_ERROR_LEN};
use crate::model::Record;
use crate::validator::Validator;
use crate::AipResult;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Requests that a running batch stop submitting work.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records never submitted because the batch halted
    pub skipped: Vec<String>,
    pub validation_passed: usize,
    pub validation_failed: usize,
    pub total_package_bytes: u64,
    pub total_archive_bytes: u64,
    pub elapsed: Duration,
    pub halted: Option<String>,
    /// Build results in input record order
    pub results: Vec<PackageBuildResult>,
}

impl BatchReport {
    /// Every failure as `<record id>: <error>`.
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.record_id,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }

    /// The first errors, truncated, and how many more were left out.
    pub fn reported_errors(&self) -> (Vec<String>, usize) {
        let errors = self.errors();
        let omitted = errors.len().saturating_sub(MAX_REPORTED_ERRORS);
        let shown = errors
            .into_iter()
            .take(MAX_REPORTED_ERRORS)
            .map(|e| truncate(&e, MAX_REPORTED_ERROR_LEN))
            .collect();
        (shown, omitted)
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} records: {} succeeded, {} failed, {} skipped ({:.1}s)",
            self.total,
            self.succeeded,
            self.failed,
            self.skipped.len(),
            self.elapsed.as_secs_f64()
        )?;
        if self.validation_passed + self.validation_failed > 0 {
            writeln!(
                f,
                "validation: {} passed, {} failed",
                self.validation_passed, self.validation_failed
            )?;
        }
        if let Some(reason) = &self.halted {
            writeln!(f, "halted: {}", reason)?;
        }
        let (errors, omitted) = self.reported_errors();
        for error in errors {
            writeln!(f, "  - {}", error)?;
        }
        if omitted > 0 {
            writeln!(f, "  ... and {} more errors", omitted)?;
        }
        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

type ChunkOutput = (usize, Vec<(usize, PackageBuildResult)>);

#[derive(Default)]
struct RunState {
    results: Vec<Option<PackageBuildResult>>,
    skipped: Vec<usize>,
    completed: usize,
    failure_seen: bool,
    halted: Option<String>,
}

/// Runs [`PackageBuilder`] over many records on a bounded worker pool.
pub struct BatchCoordinator {
    builder: PackageBuilder,
    options: BatchOptions,
    stop: StopHandle,
    progress: ProgressSink,
}

impl BatchCoordinator {
    /// # Errors
    ///
    /// Returns [`crate::AipError::InvalidConfig`] if `options` do not describe a runnable pool.
    pub fn new(builder: PackageBuilder, options: BatchOptions) -> AipResult<Self> {
        options.validate()?;
        let builder = if options.validate_after_build {
            builder.with_validator(Some(Validator::new()))
        } else {
            builder
        };
        Ok(Self {
            builder,
            options,
            stop: StopHandle::default(),
            progress: ProgressSink::new(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn progress(&self) -> &ProgressSink {
        &self.progress
    }

    /// Build every record, or the first `limit` of them, and collect the results.
    pub async fn run(
        &self,
        mut records: Vec<Record>,
        pool_root: &Path,
        output_root: &Path,
    ) -> BatchReport {
        let started = Instant::now();
        if let Some(limit) = self.options.limit.filter(|limit| *limit < records.len()) {
            tracing::info!(limit, dropped = records.len() - limit, "limiting batch");
            records.truncate(limit);
        }
        let total = records.len();
        let ids: Vec<String> = records.iter().map(|r| r.record_id().to_owned()).collect();
        let chunks = chunk_records(records, self.options.chunk_size);
        let total_chunks = chunks.len();
        tracing::info!(
            records = total,
            chunks = total_chunks,
            workers = self.options.max_workers,
            "starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_workers));
        let pool_root = Arc::new(pool_root.to_path_buf());
        let output_root = Arc::new(output_root.to_path_buf());
        let mut join_set: JoinSet<ChunkOutput> = JoinSet::new();
        let mut in_flight: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut state = RunState {
            results: (0..total).map(|_| None).collect(),
            ..RunState::default()
        };

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            while semaphore.available_permits() == 0 && !join_set.is_empty() && !self.halted(&state) {
                self.collect_next(&mut join_set, &mut in_flight, &mut state, total_chunks, total)
                    .await;
            }
            if self.halted(&state) {
                state.skipped.extend(chunk.iter().map(|(index, _)| *index));
                continue;
            }
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    state.skipped.extend(chunk.iter().map(|(index, _)| *index));
                    continue;
                }
            };

            in_flight.insert(chunk_index, chunk.iter().map(|(index, _)| *index).collect());
            let builder = self.builder.clone();
            let pool_root = Arc::clone(&pool_root);
            let output_root = Arc::clone(&output_root);
            join_set.spawn_blocking(move || {
                let _permit = permit;
                (
                    chunk_index,
                    process_chunk(&builder, chunk, pool_root.as_path(), output_root.as_path()),
                )
            });
        }

        if state.halted.is_none() && self.stop.is_stopped() {
            state.halted = Some("stop requested".into());
        }

        while !join_set.is_empty() && state.halted.as_deref() != Some(TIMED_OUT) {
            self.collect_next(&mut join_set, &mut in_flight, &mut state, total_chunks, total)
                .await;
        }

        let lost_reason = if state.halted.as_deref() == Some(TIMED_OUT) {
            "timed out waiting for result"
        } else {
            "worker task failed"
        };
        for index in in_flight.into_values().flatten() {
            state.results[index] = Some(PackageBuildResult::failed(
                &ids[index],
                lost_reason,
                started.elapsed(),
            ));
        }

        if let Some(reason) = &state.halted {
            self.progress.report(&ProgressEvent::Halted {
                reason: reason.clone(),
                completed_records: state.completed,
                total_records: total,
            });
        }

        let report = assemble_report(state, &ids, started.elapsed());
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch finished"
        );
        report
    }

    fn halted(&self, state: &RunState) -> bool {
        state.halted.is_some()
            || self.stop.is_stopped()
            || (!self.options.continue_on_error && state.failure_seen)
    }

    async fn collect_next(
        &self,
        join_set: &mut JoinSet<ChunkOutput>,
        in_flight: &mut HashMap<usize, Vec<usize>>,
        state: &mut RunState,
        total_chunks: usize,
        total_records: usize,
    ) {
        let records_in_flight = in_flight.values().map(Vec::len).sum::<usize>().max(1);
        let wait = self
            .options
            .timeout_per_record
            .saturating_mul(u32::try_from(records_in_flight).unwrap_or(u32::MAX));

        match tokio::time::timeout(wait, join_set.join_next()).await {
            Err(_) => {
                tracing::error!(
                    in_flight = records_in_flight,
                    wait_secs = wait.as_secs(),
                    "timed out waiting for batch workers"
                );
                state.halted = Some(TIMED_OUT.into());
            }
            Ok(None) => {}
            Ok(Some(Err(e))) => {
                tracing::error!(error = %e, "batch worker task failed");
            }
            Ok(Some(Ok((chunk_index, results)))) => {
                in_flight.remove(&chunk_index);
                let mut succeeded = 0;
                let mut failed = 0;
                for (index, result) in results {
                    if result.success {
                        succeeded += 1;
                    } else {
                        failed += 1;
                        state.failure_seen = true;
                    }
                    state.results[index] = Some(result);
                }
                state.completed += succeeded + failed;

                self.progress.report(&ProgressEvent::ChunkCompleted {
                    chunk_index: chunk_index + 1,
                    total_chunks,
                    succeeded,
                    failed,
                    completed_records: state.completed,
                    total_records,
                });
            }
        }

        if state.halted.is_none() {
            if self.stop.is_stopped() {
                state.halted = Some("stop requested".into());
            } else if !self.options.continue_on_error && state.failure_seen {
                state.halted = Some("record failed and continue_on_error is off".into());
            }
        }
    }
}

const TIMED_OUT: &str = "timed out";

fn chunk_records(records: Vec<Record>, chunk_size: usize) -> Vec<Vec<(usize, Record)>> {
    let mut chunks = Vec::new();
    let mut current = Vec::with_capacity(chunk_size);
    for (index, record) in records.into_iter().enumerate() {
        current.push((index, record));
        if current.len() == chunk_size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(chunk_size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn process_chunk(
    builder: &PackageBuilder,
    chunk: Vec<(usize, Record)>,
    pool_root: &Path,
    output_root: &Path,
) -> Vec<(usize, PackageBuildResult)> {
    chunk
        .into_iter()
        .map(|(index, mut record)| {
            let started = Instant::now();
            let record_id = record.record_id().to_owned();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                builder.build_package(&mut record, pool_root, output_root)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(record_id = %record_id, %message, "package build panicked");
                PackageBuildResult::failed(
                    &record_id,
                    format!("build panicked: {}", message),
                    started.elapsed(),
                )
            });
            (index, result)
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".into()
    }
}

fn assemble_report(state: RunState, ids: &[String], elapsed: Duration) -> BatchReport {
    let mut report = BatchReport {
        total: ids.len(),
        elapsed,
        halted: state.halted,
        skipped: state.skipped.iter().map(|&i| ids[i].clone()).collect(),
        ..BatchReport::default()
    };

    for result in state.results.into_iter().flatten() {
        if result.success {
            report.succeeded += 1;
            report.total_package_bytes += result.package_size_bytes;
            report.total_archive_bytes += result.archive_size_bytes;
        } else {
            report.failed += 1;
        }
        match &result.validation {
            Some(validation) if validation.is_valid() => report.validation_passed += 1,
            Some(_) => report.validation_failed += 1,
            None => {}
        }
        report.results.push(result);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::{builder, pdf};
    use crate::metadata::MetadataGenerator;
    use crate::model::{Item, ItemDescription, RecordDescription};
    use aip_files::{ContentInspector, InspectionReport, PdfInspector};
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn record(pool: &Path, id: &str, present: bool) -> Record {
        let folder = format!("hoso{}", id);
        let file = format!("{}/CODE{}.1.pdf", folder, id);
        let code = format!("CODE{}", id);
        if present {
            fs::create_dir_all(pool.join(&folder)).unwrap();
            fs::write(pool.join(&file), pdf()).unwrap();
        }
        let mut record = Record::new(
            id,
            Some(code.as_str()),
            RecordDescription::default(),
            Some("HTJSC"),
        )
        .unwrap();
        record.set_original_folder_path(&folder);
        record
            .attach_items(vec![Item::new(1, file, ItemDescription::default()).unwrap()])
            .unwrap();
        record
    }

    fn options(workers: usize, chunk: usize, continue_on_error: bool) -> BatchOptions {
        BatchOptions {
            max_workers: workers,
            chunk_size: chunk,
            timeout_per_record: Duration::from_secs(60),
            continue_on_error,
            validate_after_build: true,
            limit: None,
        }
    }

    fn builder_with_inspector(inspector: Arc<dyn ContentInspector>) -> PackageBuilder {
        let base = builder(false);
        PackageBuilder::new(
            Arc::new(base.config().clone()),
            inspector,
            MetadataGenerator::default(),
        )
    }

    struct SlowInspector(Duration);

    impl ContentInspector for SlowInspector {
        fn inspect(&self, path: &Path) -> InspectionReport {
            std::thread::sleep(self.0);
            PdfInspector.inspect(path)
        }
    }

    struct PanickingInspector;

    impl ContentInspector for PanickingInspector {
        fn inspect(&self, _path: &Path) -> InspectionReport {
            panic!("inspection exploded");
        }
    }

    #[tokio::test]
    async fn test_batch_builds_and_validates_all() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records: Vec<Record> = (1..=5)
            .map(|i| record(pool.path(), &i.to_string(), true))
            .collect();
        let sink = ProgressSink::new();
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        sink.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let coordinator = BatchCoordinator::new(builder(false), options(2, 2, true))
            .unwrap()
            .with_progress(sink);
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.validation_passed, 5);
        assert!(report.halted.is_none());
        let ids: Vec<&str> = report.results.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(events.load(Ordering::SeqCst), 3);
        assert!(report.total_archive_bytes > 0);
    }

    #[tokio::test]
    async fn test_limit_builds_leading_records_only() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records: Vec<Record> = (1..=4)
            .map(|i| record(pool.path(), &i.to_string(), true))
            .collect();
        let options = BatchOptions {
            limit: Some(2),
            ..options(2, 1, true)
        };

        let coordinator = BatchCoordinator::new(builder(false), options).unwrap();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 2);
        let ids: Vec<&str> = report.results.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_continues_after_failure() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![
            record(pool.path(), "1", false),
            record(pool.path(), "2", true),
        ];

        let coordinator = BatchCoordinator::new(builder(false), options(1, 1, true)).unwrap();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert!(report.errors()[0].starts_with("1: "));
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![
            record(pool.path(), "1", false),
            record(pool.path(), "2", true),
            record(pool.path(), "3", true),
        ];

        let coordinator = BatchCoordinator::new(builder(false), options(1, 1, false)).unwrap();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.skipped, vec!["2".to_string(), "3".to_string()]);
        assert!(report.halted.is_some());
    }

    #[tokio::test]
    async fn test_stop_before_run_skips_everything() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![record(pool.path(), "1", true)];

        let coordinator = BatchCoordinator::new(builder(false), options(1, 1, true)).unwrap();
        coordinator.stop_handle().stop();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert!(report.results.is_empty());
        assert_eq!(report.skipped, vec!["1".to_string()]);
        assert_eq!(report.halted.as_deref(), Some("stop requested"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![record(pool.path(), "1", true)];

        let coordinator = BatchCoordinator::new(
            builder_with_inspector(Arc::new(PanickingInspector)),
            options(1, 1, true),
        )
        .unwrap();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.failed, 1);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("inspection exploded"));
    }

    #[tokio::test]
    async fn test_timeout_marks_in_flight_records() {
        let pool = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let records = vec![record(pool.path(), "1", true), record(pool.path(), "2", true)];
        let mut opts = options(1, 1, true);
        opts.timeout_per_record = Duration::from_millis(20);

        let coordinator = BatchCoordinator::new(
            builder_with_inspector(Arc::new(SlowInspector(Duration::from_millis(500)))),
            opts,
        )
        .unwrap();
        let report = coordinator.run(records, pool.path(), out.path()).await;

        assert_eq!(report.halted.as_deref(), Some(TIMED_OUT));
        assert_eq!(report.failed, 1);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
        assert_eq!(report.skipped, vec!["2".to_string()]);
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(BatchCoordinator::new(builder(false), options(0, 1, true)).is_err());
    }

    #[test]
    fn test_reported_errors_are_capped_and_truncated() {
        let mut report = BatchReport::default();
        for i in 0..12 {
            report.results.push(PackageBuildResult::failed(
                &i.to_string(),
                "x".repeat(400),
                Duration::ZERO,
            ));
        }

        let (shown, omitted) = report.reported_errors();
        assert_eq!(shown.len(), MAX_REPORTED_ERRORS);
        assert_eq!(omitted, 2);
        assert_eq!(shown[0].chars().count(), MAX_REPORTED_ERROR_LEN + 3);
        assert!(report.to_string().contains("... and 2 more errors"));
    }

    #[test]
    fn test_chunk_records() {
        let pool = TempDir::new().unwrap();
        let records: Vec<Record> = (1..=5)
            .map(|i| record(pool.path(), &i.to_string(), false))
            .collect();

        let chunks = chunk_records(records, 2);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chunks[2][0].0, 4);
    }
}
