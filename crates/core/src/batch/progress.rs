//! Progress reporting for batch runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Something worth telling observers about.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ChunkCompleted {
        chunk_index: usize,
        total_chunks: usize,
        succeeded: usize,
        failed: usize,
        completed_records: usize,
        total_records: usize,
    },
    Halted {
        reason: String,
        completed_records: usize,
        total_records: usize,
    },
}

type Callback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Shared fan-out of progress events to registered callbacks.
///
/// Clones share the same callback list. A panicking callback is logged and does not affect the
/// others or the batch.
#[derive(Clone, Default)]
pub struct ProgressSink {
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl ProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(callback));
    }

    pub fn report(&self, event: &ProgressEvent) {
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for callback in callbacks.iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!("progress callback panicked");
            }
        }
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .callbacks
            .lock()
            .map(|callbacks| callbacks.len())
            .unwrap_or(0);
        f.debug_struct("ProgressSink").field("callbacks", &count).finish()
    }
}

/// Logs throughput and an estimate of the remaining time as chunks complete.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMonitor {
    started: Instant,
}

impl ProgressMonitor {
    /// Start timing now and log every event reported to `sink`.
    pub fn attach(sink: &ProgressSink) -> Self {
        let monitor = Self {
            started: Instant::now(),
        };
        sink.subscribe(move |event| monitor.observe(event));
        monitor
    }

    pub fn observe(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ChunkCompleted {
                completed_records,
                total_records,
                ..
            } => {
                let elapsed = self.started.elapsed();
                let remaining = estimate_remaining(*completed_records, *total_records, elapsed);
                let percent = if *total_records == 0 {
                    100.0
                } else {
                    *completed_records as f64 * 100.0 / *total_records as f64
                };
                tracing::info!(
                    completed = completed_records,
                    total = total_records,
                    percent = %format!("{:.1}", percent),
                    elapsed_secs = %format!("{:.1}", elapsed.as_secs_f64()),
                    remaining_secs = %remaining
                        .map(|r| format!("{:.1}", r.as_secs_f64()))
                        .unwrap_or_else(|| "unknown".into()),
                    "batch progress"
                );
            }
            ProgressEvent::Halted {
                reason,
                completed_records,
                total_records,
            } => {
                tracing::warn!(
                    completed = completed_records,
                    total = total_records,
                    %reason,
                    "batch halted"
                );
            }
        }
    }
}

/// Average time per completed record times the records left.
pub fn estimate_remaining(completed: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let left = total.saturating_sub(completed) as u32;
    Some(elapsed / completed as u32 * left)
}
