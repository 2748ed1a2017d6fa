//! Run-scoped result aggregation
//!
//! The only cross-worker shared state in the harness. Counters are atomic
//! and append-only for the duration of the run; the flush happens exactly
//! once, after the worker barrier.

use crate::runner::ScenarioReport;
use chrono::{DateTime, Utc};
use gridrunner_common::{AttemptOutcome, Error, Result, ScenarioOutcome};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// Aggregate counters for one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    passed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    retries: AtomicUsize,
    flushed: AtomicBool,
}

/// Snapshot of the aggregate counters, serialized at flush time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retries: usize,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one scenario's outcome into the counters. Safe to call from
    /// any worker.
    pub fn record(&self, report: &ScenarioReport) {
        match report.outcome {
            ScenarioOutcome::Passed => self.passed.fetch_add(1, Ordering::SeqCst),
            ScenarioOutcome::FailedFinal => self.failed.fetch_add(1, Ordering::SeqCst),
            ScenarioOutcome::Skipped => self.skipped.fetch_add(1, Ordering::SeqCst),
        };
        let retries = report
            .attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::FailedTransient)
            .count();
        if retries > 0 {
            self.retries.fetch_add(retries, Ordering::SeqCst);
        }
    }

    pub fn counts(&self) -> SummaryCounts {
        SummaryCounts {
            passed: self.passed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            finished_at: Utc::now(),
        }
    }

    /// Write the final aggregate to `output_dir/summary.json`. Must be
    /// called exactly once, after all workers have completed; a second call
    /// is an error.
    pub fn flush(&self, output_dir: &Path) -> Result<PathBuf> {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return Err(Error::Internal("run summary already flushed".into()));
        }

        let counts = self.counts();
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join("summary.json");
        std::fs::write(&path, serde_json::to_string_pretty(&counts)?)?;

        info!(
            "Run summary: {} passed, {} failed, {} skipped, {} retries",
            counts.passed, counts.failed, counts.skipped, counts.retries
        );
        Ok(path)
    }
}
