//! Retry coordination
//!
//! One coordinator per scenario execution, with private attempt state.
//! Transient failures are swallowed up to the retry budget (logging each,
//! with a diagnostics capture per retry); fatal failures and exhausted
//! budgets are terminal. The original error is always preserved for final
//! reporting.

use crate::classify::{classify, forces_session_renewal, Disposition};
use crate::diagnostics::{DiagnosticsSink, LogStatus};
use crate::registry::Session;
use gridrunner_common::{
    AttemptOutcome, AttemptRecord, DiagnosticsRef, Error, FailureClass,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the coordinator decided after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-dispatch the scenario body. `renew_session` means the failure was
    /// session loss and the worker must invalidate before re-acquiring.
    Retry {
        next_attempt: u32,
        renew_session: bool,
    },
    /// Terminal failure: fatal classification or exhausted budget.
    Fail { class: FailureClass },
    /// Explicit skip signal; not a failure, no record emitted.
    Skip,
}

/// Per-scenario retry state machine:
/// `Running(attempt) -> {Passed, Retrying(attempt+1), FailedFinal}`.
///
/// Total attempts never exceed `1 + max_retry`; attempt numbering is
/// monotonic and gapless. Never shared across workers.
pub struct RetryCoordinator {
    scenario_id: String,
    max_retry: u32,
    attempt: u32,
    records: Vec<AttemptRecord>,
    /// Externally stashed failure artifact (captured by a step hook before
    /// teardown), used as the fallback when a live capture is impossible.
    stashed: Option<DiagnosticsRef>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl RetryCoordinator {
    pub fn new(
        scenario_id: impl Into<String>,
        max_retry: u32,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            max_retry,
            attempt: 0,
            records: Vec::new(),
            stashed: None,
            sink,
        }
    }

    /// Start the next attempt, returning its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        debug!("Scenario '{}' attempt {}", self.scenario_id, self.attempt);
        self.attempt
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AttemptRecord> {
        self.records
    }

    /// Stash an already-persisted failure artifact as the capture fallback.
    pub fn stash_artifact(&mut self, artifact: DiagnosticsRef) {
        self.stashed = Some(artifact);
    }

    /// Seal the current attempt as passed.
    pub async fn seal_success(&mut self) {
        let record = AttemptRecord::passed(&self.scenario_id, self.attempt);
        self.push_and_persist(record).await;
        if self.attempt > 1 {
            self.sink.record_log(
                LogStatus::Warning,
                &format!(
                    "Scenario '{}' passed on attempt {} after {} retr{}",
                    self.scenario_id,
                    self.attempt,
                    self.attempt - 1,
                    if self.attempt == 2 { "y" } else { "ies" }
                ),
            );
        }
    }

    /// Seal the current attempt as failed and decide what happens next.
    ///
    /// Diagnostics capture is best-effort: a live capture through the
    /// current session, falling back to the stashed artifact when the
    /// session is already gone.
    pub async fn seal_failure(
        &mut self,
        error: &Error,
        session: Option<&Session>,
    ) -> RetryDecision {
        match classify(error) {
            Disposition::Skip => {
                self.sink.record_log(
                    LogStatus::Skip,
                    &format!("Scenario '{}' skipped: {}", self.scenario_id, error),
                );
                RetryDecision::Skip
            }
            Disposition::Failure(class) => {
                if class.is_transient() && self.attempt <= self.max_retry {
                    self.seal_transient_and_retry(error, class, session).await
                } else {
                    self.seal_final(error, class, session).await
                }
            }
        }
    }

    async fn seal_transient_and_retry(
        &mut self,
        error: &Error,
        class: FailureClass,
        session: Option<&Session>,
    ) -> RetryDecision {
        let diagnostics = self.capture_or_fallback(session).await;
        let record = AttemptRecord::failed(
            &self.scenario_id,
            self.attempt,
            AttemptOutcome::FailedTransient,
            class,
            error.to_string(),
            diagnostics,
        );
        self.push_and_persist(record).await;

        let message = format!(
            "Retrying scenario '{}' (attempt {}/{}) due to {:?}: {}",
            self.scenario_id,
            self.attempt,
            self.max_retry,
            class,
            truncate(&error.to_string())
        );
        warn!("{}", message);
        self.sink.record_log(LogStatus::Warning, &message);

        RetryDecision::Retry {
            next_attempt: self.attempt + 1,
            renew_session: forces_session_renewal(error),
        }
    }

    async fn seal_final(
        &mut self,
        error: &Error,
        class: FailureClass,
        session: Option<&Session>,
    ) -> RetryDecision {
        let diagnostics = self.capture_or_fallback(session).await;
        let record = AttemptRecord::failed(
            &self.scenario_id,
            self.attempt,
            AttemptOutcome::FailedFatal,
            class,
            error.to_string(),
            diagnostics.clone(),
        );
        self.push_and_persist(record).await;

        if class.is_transient() {
            // Budget exhausted. Release artifacts retained solely for retry
            // purposes; the one referenced by the final record stays.
            if let Some(stashed) = self.stashed.take() {
                if diagnostics.as_ref() != Some(&stashed) {
                    self.sink.discard(&stashed).await;
                }
            }
            self.sink.record_log(
                LogStatus::Fail,
                &format!(
                    "Scenario '{}' failed after {} attempts (retry budget {} exhausted): {}",
                    self.scenario_id,
                    self.attempt,
                    self.max_retry,
                    truncate(&error.to_string())
                ),
            );
        } else {
            self.sink.record_log(
                LogStatus::Fail,
                &format!(
                    "Not retrying scenario '{}': {:?} - {}",
                    self.scenario_id,
                    class,
                    truncate(&error.to_string())
                ),
            );
        }

        RetryDecision::Fail { class }
    }

    async fn capture_or_fallback(&mut self, session: Option<&Session>) -> Option<DiagnosticsRef> {
        if let Some(session) = session {
            let label = format!("{}_attempt{}", self.scenario_id, self.attempt);
            match self.sink.capture_screenshot(session, &label).await {
                Ok(artifact) => return Some(artifact),
                Err(e) => warn!(
                    "Live capture failed for scenario '{}': {}",
                    self.scenario_id, e
                ),
            }
        }
        if self.stashed.is_some() {
            debug!(
                "Using stashed failure artifact for scenario '{}'",
                self.scenario_id
            );
        }
        self.stashed.clone()
    }

    async fn push_and_persist(&mut self, record: AttemptRecord) {
        if let Err(e) = self.sink.persist_attempt(&record).await {
            warn!(
                "Could not persist attempt record for scenario '{}': {}",
                self.scenario_id, e
            );
        }
        self.records.push(record);
    }
}

fn truncate(message: &str) -> String {
    const LIMIT: usize = 300;
    if message.len() <= LIMIT {
        return message.to_string();
    }
    let mut cut = LIMIT;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &message[..cut])
}
