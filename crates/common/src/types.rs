//! Core types for GridRunner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a worker. One worker runs one scenario at a time and owns at
/// most one browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Browser session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    Closing,
    Closed,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// Failure taxonomy assigned by the classifier. Transient classes are
/// eligible for retry; fatal classes never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    TransientNetwork,
    TransientUiTiming,
    FatalAssertion,
    FatalOther,
}

impl FailureClass {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureClass::TransientNetwork | FailureClass::TransientUiTiming
        )
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Passed,
    FailedTransient,
    FailedFatal,
}

/// Terminal outcome of a scenario execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    FailedFinal,
    Skipped,
}

/// Opaque handle to a captured diagnostics artifact, produced by the
/// diagnostics sink. The core never interprets its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsRef(pub String);

impl std::fmt::Display for DiagnosticsRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record of one attempt at a scenario, sealed when the attempt concludes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub scenario_id: String,
    /// 1-based, strictly increasing, gapless per scenario execution.
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<FailureClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_ref: Option<DiagnosticsRef>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Seal a passing attempt.
    pub fn passed(scenario_id: impl Into<String>, attempt_number: u32) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            attempt_number,
            outcome: AttemptOutcome::Passed,
            error_class: None,
            error_message: None,
            diagnostics_ref: None,
            recorded_at: Utc::now(),
        }
    }

    /// Seal a failed attempt with its classification and message.
    pub fn failed(
        scenario_id: impl Into<String>,
        attempt_number: u32,
        outcome: AttemptOutcome,
        error_class: FailureClass,
        error_message: impl Into<String>,
        diagnostics_ref: Option<DiagnosticsRef>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            attempt_number,
            outcome,
            error_class: Some(error_class),
            error_message: Some(error_message.into()),
            diagnostics_ref,
            recorded_at: Utc::now(),
        }
    }
}
