// Session metrics
//
// Lightweight counters for one editing session

use crate::models::TaskKind;
use crate::worker::WorkerResponse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Uses atomic operations for thread-safe tracking without locks. The
/// response pump and the caller's thread record concurrently.
#[derive(Debug)]
pub struct SessionMetrics {
    /// Editing operations that changed state
    pub edits: AtomicU64,

    /// Editing operations that were no-ops
    pub ignored_edits: AtomicU64,

    /// Requests posted to the worker
    pub requests_sent: AtomicU64,

    /// Worker responses applied to state
    pub responses_applied: AtomicU64,

    /// Thumbnails received
    pub thumbnails: AtomicU64,

    /// ERROR responses, including channel failures
    pub worker_errors: AtomicU64,

    pub saves_completed: AtomicU64,
    pub extracts_completed: AtomicU64,

    start_time: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            edits: AtomicU64::new(0),
            ignored_edits: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            responses_applied: AtomicU64::new(0),
            thumbnails: AtomicU64::new(0),
            worker_errors: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            extracts_completed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count an editing operation by whether it took effect
    pub fn record_edit(&self, applied: bool) {
        if applied {
            self.edits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ignored_edits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a worker response by kind
    pub fn record_response(&self, response: &WorkerResponse) {
        self.responses_applied.fetch_add(1, Ordering::Relaxed);
        match response {
            WorkerResponse::FileParsed { .. } => {}
            WorkerResponse::ThumbnailGenerated { .. } => {
                self.thumbnails.fetch_add(1, Ordering::Relaxed);
            }
            WorkerResponse::MergeComplete { task_kind, .. } => {
                let counter = match task_kind {
                    TaskKind::Save => &self.saves_completed,
                    TaskKind::Extract => &self.extracts_completed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            WorkerResponse::Error { .. } => {
                self.worker_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Edits: {} applied, {} ignored",
            self.edits.load(Ordering::Relaxed),
            self.ignored_edits.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Worker: {} requests, {} responses, {} thumbnails, {} errors",
            self.requests_sent.load(Ordering::Relaxed),
            self.responses_applied.load(Ordering::Relaxed),
            self.thumbnails.load(Ordering::Relaxed),
            self.worker_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Artifacts: {} saved, {} extracted",
            self.saves_completed.load(Ordering::Relaxed),
            self.extracts_completed.load(Ordering::Relaxed)
        );
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
