//! Diagnostics sink - the audit-trail boundary
//!
//! The harness calls a sink at step failure, retry decision and scenario
//! finalization. How artifacts are rendered or stored is the sink's
//! business; the core only holds opaque references.

use crate::registry::Session;
use async_trait::async_trait;
use gridrunner_common::{AttemptRecord, DiagnosticsRef, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Log status for sink entries, mirroring the report-level statuses of the
/// scenario audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Info,
    Pass,
    Fail,
    Warning,
    Skip,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogStatus::Info => "INFO",
            LogStatus::Pass => "PASS",
            LogStatus::Fail => "FAIL",
            LogStatus::Warning => "WARN",
            LogStatus::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

/// Where the harness reports what happened. Implementations own storage and
/// rendering; the core never inspects the format.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    /// Record a structured log entry for the current scenario.
    fn record_log(&self, status: LogStatus, message: &str);

    /// Capture a screenshot through the session and persist it, returning
    /// an opaque reference to the stored artifact.
    async fn capture_screenshot(&self, session: &Session, label: &str) -> Result<DiagnosticsRef>;

    /// Persist a sealed attempt record.
    async fn persist_attempt(&self, record: &AttemptRecord) -> Result<()>;

    /// Release an artifact that was retained only for retry purposes.
    /// Best-effort; failures are the sink's problem.
    async fn discard(&self, artifact: &DiagnosticsRef);
}

/// Filesystem sink: PNG screenshots plus an append-only JSONL attempt log
/// under an output directory.
pub struct FsDiagnosticsSink {
    screenshot_dir: PathBuf,
    attempt_log: PathBuf,
    append_guard: Mutex<()>,
}

impl FsDiagnosticsSink {
    pub fn new(output_dir: &Path) -> Result<Self> {
        let screenshot_dir = output_dir.join("screenshots");
        std::fs::create_dir_all(&screenshot_dir)?;
        Ok(Self {
            screenshot_dir,
            attempt_log: output_dir.join("attempts.jsonl"),
            append_guard: Mutex::new(()),
        })
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    pub fn attempt_log(&self) -> &Path {
        &self.attempt_log
    }
}

#[async_trait]
impl DiagnosticsSink for FsDiagnosticsSink {
    fn record_log(&self, status: LogStatus, message: &str) {
        match status {
            LogStatus::Fail => error!("[{}] {}", status, message),
            LogStatus::Warning => warn!("[{}] {}", status, message),
            _ => info!("[{}] {}", status, message),
        }
    }

    async fn capture_screenshot(&self, session: &Session, label: &str) -> Result<DiagnosticsRef> {
        let bytes = session.backend().screenshot().await?;
        let filename = format!(
            "{}_{}.png",
            sanitize(label),
            chrono::Utc::now().format("%Y%m%d_%H%M%S%3f")
        );
        let path = self.screenshot_dir.join(filename);
        std::fs::write(&path, bytes)?;
        debug!("Screenshot saved: {}", path.display());
        Ok(DiagnosticsRef(path.display().to_string()))
    }

    async fn persist_attempt(&self, record: &AttemptRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.append_guard.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.attempt_log)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    async fn discard(&self, artifact: &DiagnosticsRef) {
        if let Err(e) = std::fs::remove_file(&artifact.0) {
            debug!("Could not remove artifact {}: {}", artifact, e);
        }
    }
}

/// Collapse whitespace and path-hostile characters so labels make safe
/// filenames.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
