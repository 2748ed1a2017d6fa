//! Retry behavior: budgets, classification gates, session renewal and
//! diagnostics capture across attempts.

use gridrunner_common::{
    AttemptOutcome, BrowserConfig, DiagnosticsRef, Error, FailureClass, HarnessConfig,
    ScenarioOutcome, WorkerId,
};
use gridrunner_harness::registry::SessionRegistry;
use gridrunner_harness::retry::{RetryCoordinator, RetryDecision};
use gridrunner_harness::runner::{Scenario, ScenarioRunner};
use gridrunner_harness::testkit::{MemorySink, SimProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn harness(max_retry: u32) -> (ScenarioRunner, Arc<SimProvider>, Arc<MemorySink>) {
    let config = HarnessConfig {
        max_retry,
        poll_interval_ms: 10,
        explicit_wait_timeout_ms: 500,
        ..Default::default()
    };
    let provider = Arc::new(SimProvider::new());
    let sink = Arc::new(MemorySink::new());
    let runner = ScenarioRunner::new(config, provider.clone(), sink.clone());
    (runner, provider, sink)
}

fn worker() -> WorkerId {
    WorkerId::new("worker-0")
}

#[tokio::test]
async fn assertion_failures_are_never_retried() {
    let (runner, _provider, _sink) = harness(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    let scenario = Scenario::new("strict-totals", move |_cx| {
        let calls = calls2.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Assertion("expected 3 rows, got 2".into()))
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::FailedFinal);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::FailedFatal);
    assert_eq!(
        report.attempts[0].error_class,
        Some(FailureClass::FatalAssertion)
    );
    // The original message survives to final reporting.
    assert!(report.error.unwrap().contains("expected 3 rows, got 2"));
}

#[tokio::test]
async fn transient_failures_retry_until_the_budget_is_exhausted() {
    let (runner, _provider, _sink) = harness(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    let scenario = Scenario::new("always-stale", move |_cx| {
        let calls = calls2.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::StaleElement("#submit".into()))
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::FailedFinal);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "expected 1 + max_retry attempts");
    assert_eq!(report.attempts.len(), 3);
    for (i, attempt) in report.attempts.iter().enumerate() {
        assert_eq!(attempt.attempt_number as usize, i + 1, "gapless numbering");
        assert_eq!(
            attempt.error_class,
            Some(FailureClass::TransientUiTiming)
        );
    }
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::FailedTransient);
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::FailedTransient);
    assert_eq!(report.attempts[2].outcome, AttemptOutcome::FailedFatal);
    assert!(report.error.unwrap().contains("Stale element"));
}

#[tokio::test]
async fn scenario_passes_after_transient_retries_with_history_preserved() {
    let (runner, _provider, sink) = harness(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    let scenario = Scenario::new("flaky-gateway", move |_cx| {
        let calls = calls2.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= 2 {
                Err(Error::SocketTimeout("gateway 504".into()))
            } else {
                Ok(())
            }
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Passed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.attempts.len(), 3);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::FailedTransient);
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::FailedTransient);
    assert_eq!(report.attempts[2].outcome, AttemptOutcome::Passed);

    // Retry history lands in the aggregate and the persisted attempt log.
    let counts = runner.summary().counts();
    assert_eq!(counts.passed, 1);
    assert_eq!(counts.retries, 2);
    assert_eq!(sink.attempts().len(), 3);
}

#[tokio::test]
async fn zero_budget_is_pass_through() {
    let (runner, _provider, _sink) = harness(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    let scenario = Scenario::new("no-retries", move |_cx| {
        let calls = calls2.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::SocketTimeout("gateway 504".into()))
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::FailedFinal);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn skip_signals_bypass_retry_and_records() {
    let (runner, _provider, sink) = harness(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();

    let scenario = Scenario::new("gated-feature", move |_cx| {
        let calls = calls2.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Skip("feature flag off in this env".into()))
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.attempts.is_empty());
    assert!(report.error.unwrap().contains("feature flag off"));
    assert!(sink.attempts().is_empty());
    assert_eq!(runner.summary().counts().skipped, 1);
}

#[tokio::test]
async fn session_loss_forces_a_fresh_session_on_retry() {
    let (runner, provider, _sink) = harness(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();

    let scenario = Scenario::new("crashy-tab", move |cx| {
        let calls = calls2.clone();
        let seen = seen2.clone();
        async move {
            seen.lock().unwrap().push(cx.session.id().to_string());
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                Err(Error::SessionLost("tab crashed".into()))
            } else {
                Ok(())
            }
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Passed);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0], seen[1], "retry must not reuse a lost session");
    assert_eq!(provider.counters().created.load(Ordering::SeqCst), 2);
    assert_eq!(provider.counters().closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timing_failures_reuse_the_same_session_on_retry() {
    let (runner, provider, _sink) = harness(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();

    let scenario = Scenario::new("slow-modal", move |cx| {
        let calls = calls2.clone();
        let seen = seen2.clone();
        async move {
            seen.lock().unwrap().push(cx.session.id().to_string());
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                Err(Error::ClickIntercepted("#cookie-banner".into()))
            } else {
                Ok(())
            }
        }
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Passed);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], seen[1], "timing failures keep the session");
    assert_eq!(provider.counters().created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vendor_status_hook_fires_at_finalization() {
    let (runner, provider, _sink) = harness(0);

    let passing = Scenario::new("happy-path", |_cx| async { Ok(()) });
    runner.run_once(&worker(), &passing).await;
    let backend = provider.last_backend().unwrap();
    assert_eq!(backend.status_reports().len(), 1);
    assert!(backend.status_reports()[0].0);

    let failing = Scenario::new("sad-path", |_cx| async {
        Err(Error::Assertion("totals differ".into()))
    });
    runner.run_once(&worker(), &failing).await;
    let reports = provider.last_backend().unwrap().status_reports();
    assert_eq!(reports.len(), 2);
    assert!(!reports[1].0);
    assert!(reports[1].1.contains("totals differ"));
}

#[tokio::test]
async fn retry_captures_a_screenshot_per_failed_attempt() {
    let (runner, _provider, sink) = harness(2);
    let scenario = Scenario::new("always-stale", |_cx| async {
        Err(Error::StaleElement("#grid".into()))
    });

    let report = runner.run_once(&worker(), &scenario).await;

    assert_eq!(report.attempts.len(), 3);
    for attempt in &report.attempts {
        assert!(attempt.diagnostics_ref.is_some(), "missing capture");
    }
    assert_eq!(sink.capture_count(), 3);
}

#[tokio::test]
async fn capture_falls_back_to_the_stashed_artifact_when_the_session_is_gone() {
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = RetryCoordinator::new("torn-down", 2, sink.clone());
    let stashed = DiagnosticsRef("tmp://torn-down/pre-teardown.png".into());
    coordinator.stash_artifact(stashed.clone());

    coordinator.begin_attempt();
    let decision = coordinator
        .seal_failure(&Error::SessionLost("driver already quit".into()), None)
        .await;

    assert_eq!(
        decision,
        RetryDecision::Retry {
            next_attempt: 2,
            renew_session: true
        }
    );
    assert_eq!(
        coordinator.records()[0].diagnostics_ref,
        Some(stashed),
        "fallback artifact should be attached to the record"
    );
}

#[tokio::test]
async fn exhaustion_discards_artifacts_no_record_references() {
    let provider = Arc::new(SimProvider::new());
    let registry = SessionRegistry::new(provider.clone(), BrowserConfig::default());
    let session = registry.acquire(&worker()).await.unwrap();

    let sink = Arc::new(MemorySink::new());
    let mut coordinator = RetryCoordinator::new("exhausted", 0, sink.clone());
    let stashed = DiagnosticsRef("tmp://exhausted/pre-teardown.png".into());
    coordinator.stash_artifact(stashed.clone());

    coordinator.begin_attempt();
    let decision = coordinator
        .seal_failure(&Error::StaleElement("#x".into()), Some(&session))
        .await;

    assert!(matches!(decision, RetryDecision::Fail { .. }));
    // The live capture won; the stashed temp artifact is released.
    let diag = coordinator.records()[0].diagnostics_ref.clone().unwrap();
    assert!(diag.0.starts_with("mem://"));
    assert_eq!(sink.discarded(), vec![stashed]);
}

#[tokio::test]
async fn exhaustion_keeps_the_stash_when_the_final_record_uses_it() {
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = RetryCoordinator::new("kept", 0, sink.clone());
    let stashed = DiagnosticsRef("tmp://kept/pre-teardown.png".into());
    coordinator.stash_artifact(stashed.clone());

    coordinator.begin_attempt();
    let decision = coordinator
        .seal_failure(&Error::SocketTimeout("gateway".into()), None)
        .await;

    assert!(matches!(decision, RetryDecision::Fail { .. }));
    assert_eq!(coordinator.records()[0].diagnostics_ref, Some(stashed));
    assert!(sink.discarded().is_empty());
}
