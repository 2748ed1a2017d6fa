//! GridRunner Harness
//!
//! The engine behind GridRunner: worker-owned browser sessions, a
//! deadline-bounded polling wait engine, a closed failure taxonomy, and
//! classification-driven selective retry with per-attempt diagnostics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                           │
//! │   run_suite() ── worker pool ── run_once() per scenario      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  SessionRegistry          RetryCoordinator                   │
//! │    acquire/release/         begin_attempt                    │
//! │    invalidate               seal_success / seal_failure      │
//! │      │                        │         │                    │
//! │  DriverProvider          classify()  DiagnosticsSink         │
//! │  (external)                          (screenshots + logs)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ConditionWaiter: wait_for / wait_until / wait_for_stable    │
//! │  (the single chokepoint for every "wait for UI state")       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scenario bodies are opaque async callbacks supplied by the surrounding
//! test framework. The harness never interprets step content; it owns the
//! session lifecycle, the waits, the failure classification and the retry
//! budget around each body invocation.

pub mod classify;
pub mod diagnostics;
pub mod driver;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod summary;
pub mod testkit;
pub mod waiter;

pub use classify::{classify, forces_session_renewal, Disposition};
pub use diagnostics::{DiagnosticsSink, FsDiagnosticsSink, LogStatus};
pub use driver::{DriverProvider, SessionBackend};
pub use registry::{Session, SessionRegistry};
pub use retry::{RetryCoordinator, RetryDecision};
pub use runner::{RunReport, Scenario, ScenarioReport, ScenarioRunner, StepContext};
pub use summary::{RunSummary, SummaryCounts};
pub use waiter::{ConditionWaiter, StableSpec, WaitSpec};
