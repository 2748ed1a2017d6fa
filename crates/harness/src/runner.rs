//! Scenario runner - the boundary the surrounding test framework calls
//!
//! Wraps every scenario invocation in the retry coordinator (explicit
//! composition, no implicit discovery), drives session acquisition and
//! renewal, and aggregates per-scenario reports into a run report.

use crate::diagnostics::{DiagnosticsSink, LogStatus};
use crate::driver::DriverProvider;
use crate::registry::{Session, SessionRegistry};
use crate::retry::{RetryCoordinator, RetryDecision};
use crate::summary::RunSummary;
use crate::waiter::ConditionWaiter;
use futures::future::{join_all, BoxFuture};
use gridrunner_common::{
    AttemptRecord, Error, HarnessConfig, Result, ScenarioOutcome, WorkerId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything a scenario body gets to work with: the worker's session and a
/// waiter configured from the harness defaults.
#[derive(Clone)]
pub struct StepContext {
    pub session: Arc<Session>,
    pub waiter: ConditionWaiter,
}

type ScenarioBody = Arc<dyn Fn(StepContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// An opaque scenario: an identifier plus an async body supplied by the
/// surrounding test framework. The body is re-dispatched whole on retry, so
/// it must be safe to run more than once.
#[derive(Clone)]
pub struct Scenario {
    id: String,
    body: ScenarioBody,
}

impl Scenario {
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            body: Arc::new(move |cx| Box::pin(body(cx))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("id", &self.id).finish()
    }
}

/// Result of one scenario execution, retry history included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario_id: String,
    pub outcome: ScenarioOutcome,
    pub attempts: Vec<AttemptRecord>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a whole suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

/// Drives scenarios through sessions, waits, classification and retry.
#[derive(Clone)]
pub struct ScenarioRunner {
    config: HarnessConfig,
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn DiagnosticsSink>,
    summary: Arc<RunSummary>,
}

impl ScenarioRunner {
    pub fn new(
        config: HarnessConfig,
        provider: Arc<dyn DriverProvider>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(provider, config.browser.clone()));
        Self {
            config,
            registry,
            sink,
            summary: Arc::new(RunSummary::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn summary(&self) -> &Arc<RunSummary> {
        &self.summary
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario to its terminal outcome, retrying transient
    /// failures within the configured budget. The worker's session is
    /// reused across attempts unless a failure forces renewal; it is NOT
    /// released here - sessions live until worker shutdown.
    pub async fn run_once(&self, worker: &WorkerId, scenario: &Scenario) -> ScenarioReport {
        let start = Instant::now();
        let waiter = ConditionWaiter::from_config(&self.config);
        let mut coordinator =
            RetryCoordinator::new(scenario.id(), self.config.max_retry, self.sink.clone());

        self.sink.record_log(
            LogStatus::Info,
            &format!("===== Starting scenario: {} =====", scenario.id()),
        );

        loop {
            let session = match self.registry.acquire(worker).await {
                Ok(session) => session,
                Err(error) => {
                    // Provisioning failures go through the same
                    // classification and budget as body failures.
                    coordinator.begin_attempt();
                    match coordinator.seal_failure(&error, None).await {
                        RetryDecision::Retry { renew_session, .. } => {
                            if renew_session {
                                self.registry.invalidate(worker).await;
                            }
                            continue;
                        }
                        RetryDecision::Fail { .. } => {
                            return self
                                .finish(
                                    scenario,
                                    ScenarioOutcome::FailedFinal,
                                    coordinator,
                                    Some(error),
                                    None,
                                    start,
                                )
                                .await;
                        }
                        RetryDecision::Skip => {
                            return self
                                .finish(
                                    scenario,
                                    ScenarioOutcome::Skipped,
                                    coordinator,
                                    Some(error),
                                    None,
                                    start,
                                )
                                .await;
                        }
                    }
                }
            };

            let attempt = coordinator.begin_attempt();
            debug!(
                "Scenario '{}' attempt {} on session {} ({})",
                scenario.id(),
                attempt,
                session.id(),
                worker
            );

            let cx = StepContext {
                session: session.clone(),
                waiter,
            };
            match (scenario.body)(cx).await {
                Ok(()) => {
                    coordinator.seal_success().await;
                    return self
                        .finish(
                            scenario,
                            ScenarioOutcome::Passed,
                            coordinator,
                            None,
                            Some(&session),
                            start,
                        )
                        .await;
                }
                Err(error) => match coordinator.seal_failure(&error, Some(&session)).await {
                    RetryDecision::Retry { renew_session, .. } => {
                        if renew_session {
                            self.registry.invalidate(worker).await;
                        }
                    }
                    RetryDecision::Fail { .. } => {
                        return self
                            .finish(
                                scenario,
                                ScenarioOutcome::FailedFinal,
                                coordinator,
                                Some(error),
                                Some(&session),
                                start,
                            )
                            .await;
                    }
                    RetryDecision::Skip => {
                        return self
                            .finish(
                                scenario,
                                ScenarioOutcome::Skipped,
                                coordinator,
                                Some(error),
                                Some(&session),
                                start,
                            )
                            .await;
                    }
                },
            }
        }
    }

    /// Run a suite across the configured worker pool. Each worker owns its
    /// session for the whole run and releases it at shutdown; the summary
    /// is flushed exactly once, after every worker has joined.
    pub async fn run_suite(&self, scenarios: Vec<Scenario>) -> RunReport {
        let start = Instant::now();
        let total = scenarios.len();
        let workers = self.config.workers.max(1);
        info!("Running {} scenario(s) across {} worker(s)", total, workers);

        let queue = Arc::new(Mutex::new(VecDeque::from(scenarios)));
        let reports = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let runner = self.clone();
            let queue = queue.clone();
            let reports = reports.clone();
            handles.push(tokio::spawn(async move {
                let worker = WorkerId::new(format!("worker-{}", index));
                loop {
                    let next = queue.lock().pop_front();
                    let Some(scenario) = next else { break };
                    let report = runner.run_once(&worker, &scenario).await;
                    reports.lock().push(report);
                }
                runner.registry.release(&worker).await;
            }));
        }

        // Barrier: the flush must not race any in-flight worker.
        let _ = join_all(handles).await;

        match self.summary.flush(&self.config.output_dir) {
            Ok(path) => info!("Summary written to {}", path.display()),
            Err(e) => warn!("Summary flush failed: {}", e),
        }

        let results: Vec<ScenarioReport> = std::mem::take(&mut *reports.lock());
        let passed = results
            .iter()
            .filter(|r| r.outcome == ScenarioOutcome::Passed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.outcome == ScenarioOutcome::FailedFinal)
            .count();
        let skipped = results
            .iter()
            .filter(|r| r.outcome == ScenarioOutcome::Skipped)
            .count();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        RunReport {
            total,
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Write the detailed run report to `output_dir/run-report.json`.
    pub fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join("run-report.json");
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!("Report written to: {}", path.display());
        Ok(path)
    }

    async fn finish(
        &self,
        scenario: &Scenario,
        outcome: ScenarioOutcome,
        coordinator: RetryCoordinator,
        error: Option<Error>,
        session: Option<&Arc<Session>>,
        start: Instant,
    ) -> ScenarioReport {
        // Vendor status hook, best-effort: never affects the outcome.
        if let Some(session) = session {
            let passed = outcome == ScenarioOutcome::Passed;
            let note = match &error {
                Some(e) => e.to_string(),
                None => "all steps passed".to_string(),
            };
            if let Err(e) = session.backend().report_status(passed, &note).await {
                debug!("Session status callback failed (ignored): {}", e);
            }
        }

        match outcome {
            ScenarioOutcome::Passed => self.sink.record_log(
                LogStatus::Pass,
                &format!("Scenario passed: {}", scenario.id()),
            ),
            ScenarioOutcome::FailedFinal => self.sink.record_log(
                LogStatus::Fail,
                &format!(
                    "Scenario failed: {}: {}",
                    scenario.id(),
                    error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                ),
            ),
            ScenarioOutcome::Skipped => self.sink.record_log(
                LogStatus::Skip,
                &format!(
                    "Scenario skipped: {}: {}",
                    scenario.id(),
                    error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                ),
            ),
        }

        let report = ScenarioReport {
            scenario_id: scenario.id().to_string(),
            outcome,
            attempts: coordinator.into_records(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: error.map(|e| e.to_string()),
        };
        self.summary.record(&report);
        report
    }
}
