//! Simulation doubles for exercising the harness without a real browser.
//!
//! This module is intentionally part of the library, not just the tests:
//! downstream crates embedding the harness can drive their own scenario
//! plumbing against `SimProvider`/`MemorySink` before pointing it at a real
//! driver provider.

use crate::diagnostics::{DiagnosticsSink, LogStatus};
use crate::driver::{DriverProvider, SessionBackend};
use crate::registry::Session;
use async_trait::async_trait;
use gridrunner_common::{AttemptRecord, BrowserConfig, DiagnosticsRef, Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared lifecycle counters for simulated sessions.
#[derive(Debug, Default)]
pub struct SimCounters {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub screenshots: AtomicUsize,
}

/// Simulated browser backend with switchable failure modes.
pub struct SimBackend {
    id: String,
    counters: Arc<SimCounters>,
    healthy: AtomicBool,
    fail_screenshot: AtomicBool,
    fail_close: AtomicBool,
    status_reports: Mutex<Vec<(bool, String)>>,
}

impl SimBackend {
    fn new(id: String, counters: Arc<SimCounters>) -> Self {
        Self {
            id,
            counters,
            healthy: AtomicBool::new(true),
            fail_screenshot: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            status_reports: Mutex::new(Vec::new()),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn fail_screenshots(&self, fail: bool) {
        self.fail_screenshot.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn status_reports(&self) -> Vec<(bool, String)> {
        self.status_reports.lock().clone()
    }
}

#[async_trait]
impl SessionBackend for SimBackend {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.fail_screenshot.load(Ordering::SeqCst) {
            return Err(Error::SessionLost(format!("{} is gone", self.id)));
        }
        self.counters.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn close(&self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Teardown(format!("{} refused to close", self.id)));
        }
        Ok(())
    }

    async fn report_status(&self, passed: bool, note: &str) -> Result<()> {
        self.status_reports.lock().push((passed, note.to_string()));
        Ok(())
    }
}

/// Simulated driver provider handing out [`SimBackend`] sessions.
#[derive(Default)]
pub struct SimProvider {
    counters: Arc<SimCounters>,
    fail_create: AtomicBool,
    last: Mutex<Option<Arc<SimBackend>>>,
}

impl SimProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &Arc<SimCounters> {
        &self.counters
    }

    /// Make subsequent `create_session` calls fail until reset.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// The most recently provisioned backend, for poking failure modes.
    pub fn last_backend(&self) -> Option<Arc<SimBackend>> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl DriverProvider for SimProvider {
    async fn create_session(&self, _config: &BrowserConfig) -> Result<Arc<dyn SessionBackend>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Unreachable("sim grid is down".into()));
        }
        let n = self.counters.created.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = Arc::new(SimBackend::new(format!("sim-{}", n), self.counters.clone()));
        *self.last.lock() = Some(backend.clone());
        Ok(backend)
    }
}

/// In-memory diagnostics sink recording every call for assertions.
#[derive(Default)]
pub struct MemorySink {
    logs: Mutex<Vec<(LogStatus, String)>>,
    attempts: Mutex<Vec<AttemptRecord>>,
    discarded: Mutex<Vec<DiagnosticsRef>>,
    captures: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<(LogStatus, String)> {
        self.logs.lock().clone()
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().clone()
    }

    pub fn discarded(&self) -> Vec<DiagnosticsRef> {
        self.discarded.lock().clone()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosticsSink for MemorySink {
    fn record_log(&self, status: LogStatus, message: &str) {
        self.logs.lock().push((status, message.to_string()));
    }

    async fn capture_screenshot(&self, session: &Session, label: &str) -> Result<DiagnosticsRef> {
        // Goes through the backend so simulated capture failures surface
        // exactly where real ones would.
        let _bytes = session.backend().screenshot().await?;
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DiagnosticsRef(format!(
            "mem://{}/{}#{}",
            session.id(),
            label,
            n
        )))
    }

    async fn persist_attempt(&self, record: &AttemptRecord) -> Result<()> {
        self.attempts.lock().push(record.clone());
        Ok(())
    }

    async fn discard(&self, artifact: &DiagnosticsRef) {
        self.discarded.lock().push(artifact.clone());
    }
}

/// Initialise test logging once; safe to call from every test.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
