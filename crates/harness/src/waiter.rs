//! Condition wait engine
//!
//! The single chokepoint for every "wait for UI state" operation: bounded
//! sleep-poll cycles against a hard deadline, never unbounded blocking.
//! Deadlines use `tokio::time::Instant` so the paused test clock drives
//! waits deterministically.

use gridrunner_common::{Error, HarnessConfig, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Parameters for a single wait. Constructed per call, consumed immediately.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    description: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitSpec {
    pub fn new(description: impl Into<String>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            description: description.into(),
            timeout,
            poll_interval,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Parameters for a stability wait.
#[derive(Debug, Clone)]
pub struct StableSpec {
    pub description: String,
    /// How long the snapshot must remain unchanged to count as stable.
    pub stable_window: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Polls probes against deadlines. Cheap to copy; carries only the
/// configured defaults.
#[derive(Debug, Clone, Copy)]
pub struct ConditionWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl ConditionWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.poll_interval(), config.explicit_wait_timeout())
    }

    /// A spec with this waiter's default timeout and poll interval.
    pub fn spec(&self, description: impl Into<String>) -> WaitSpec {
        WaitSpec::new(description, self.timeout, self.poll_interval)
    }

    /// Repeatedly evaluate `probe` until it yields a value or the deadline
    /// elapses. Probe errors are treated as "condition not yet satisfied"
    /// and remembered for the timeout message; wait-fatal session errors
    /// re-raise immediately. At least one evaluation happens even when the
    /// timeout is shorter than the poll interval.
    pub async fn wait_for<T, F, Fut>(&self, spec: &WaitSpec, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if spec.timeout.is_zero() || spec.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(format!(
                "wait '{}' requires a positive timeout and poll interval",
                spec.description
            )));
        }

        debug!("Waiting for {}", spec.description);
        let deadline = Instant::now() + spec.timeout;
        let mut last_seen: Option<String> = None;

        loop {
            match probe().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => last_seen = None,
                Err(e) if e.is_wait_fatal() => {
                    warn!("Wait for {} aborted: {}", spec.description, e);
                    return Err(e.context(format!("waiting for {}", spec.description)));
                }
                Err(e) => last_seen = Some(e.to_string()),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Timed out waiting for {}", spec.description);
                return Err(Error::WaitTimeout {
                    description: spec.description.clone(),
                    last_seen,
                });
            }
            sleep((deadline - now).min(spec.poll_interval)).await;
        }
    }

    /// Boolean-probe convenience over [`wait_for`](Self::wait_for).
    pub async fn wait_until<F, Fut>(&self, spec: &WaitSpec, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.wait_for(spec, move || {
            let fut = probe();
            async move { Ok(fut.await?.then_some(())) }
        })
        .await
    }

    /// Poll `snapshot` until its value has been unchanged for
    /// `stable_window`. The unchanged-timer resets whenever the snapshot
    /// changes or errors. Returns `false` if `timeout` elapses without
    /// reaching stability - instability is an expected outcome here, not an
    /// exception.
    pub async fn wait_for_stable<S, F, Fut>(&self, spec: &StableSpec, mut snapshot: F) -> bool
    where
        S: PartialEq,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let poll = spec.poll_interval.max(Duration::from_millis(1));
        debug!("Waiting for {} to stabilize", spec.description);
        let deadline = Instant::now() + spec.timeout;
        let mut last: Option<S> = None;
        let mut stable_since: Option<Instant> = None;

        loop {
            match snapshot().await {
                Ok(snap) => {
                    if last.as_ref() == Some(&snap) {
                        if let Some(since) = stable_since {
                            if since.elapsed() >= spec.stable_window {
                                debug!("{} stable", spec.description);
                                return true;
                            }
                        }
                    } else {
                        last = Some(snap);
                        stable_since = Some(Instant::now());
                    }
                }
                Err(_) => {
                    last = None;
                    stable_since = None;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("{} did not stabilize within {:?}", spec.description, spec.timeout);
                return false;
            }
            sleep((deadline - now).min(poll)).await;
        }
    }
}
