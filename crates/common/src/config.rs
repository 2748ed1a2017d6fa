//! Harness configuration
//!
//! Precedence: `GRIDRUNNER_*` environment variables override the TOML file,
//! which overrides built-in defaults. Invalid overlay values are logged and
//! ignored rather than failing the run.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Maximum number of retries per scenario. 0 disables retries.
    pub max_retry: u32,

    /// Interval between probe evaluations in the wait engine.
    pub poll_interval_ms: u64,

    /// Default deadline for explicit waits.
    pub explicit_wait_timeout_ms: u64,

    /// Number of concurrent workers.
    pub workers: usize,

    /// Directory for run artifacts (screenshots, attempt log, summary).
    pub output_dir: PathBuf,

    /// Browser session configuration, passed through to the driver provider.
    pub browser: BrowserConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_retry: 0,
            poll_interval_ms: 200,
            explicit_wait_timeout_ms: 10_000,
            workers: 1,
            output_dir: crate::default_output_dir(),
            browser: BrowserConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file and apply the environment overlay.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&raw)?;
        Ok(config.overlay_env())
    }

    /// Apply `GRIDRUNNER_*` environment variables over this configuration.
    pub fn overlay_env(mut self) -> Self {
        overlay_parsed("GRIDRUNNER_MAX_RETRY", &mut self.max_retry);
        overlay_parsed("GRIDRUNNER_POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        overlay_parsed(
            "GRIDRUNNER_EXPLICIT_WAIT_MS",
            &mut self.explicit_wait_timeout_ms,
        );
        overlay_parsed("GRIDRUNNER_WORKERS", &mut self.workers);
        if let Ok(dir) = std::env::var("GRIDRUNNER_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir.trim());
            }
        }
        overlay_parsed("GRIDRUNNER_BROWSER", &mut self.browser.kind);
        overlay_parsed("GRIDRUNNER_HEADLESS", &mut self.browser.headless);
        if let Ok(endpoint) = std::env::var("GRIDRUNNER_REMOTE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.browser.remote_endpoint = Some(endpoint.trim().to_string());
            }
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn explicit_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.explicit_wait_timeout_ms)
    }
}

fn overlay_parsed<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        if raw.trim().is_empty() {
            return;
        }
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Invalid value for {}: {:?} - keeping previous", key, raw),
        }
    }
}

/// Browser session configuration. The harness never interprets these beyond
/// passing them to the driver-provisioning collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Browser to drive.
    pub kind: BrowserKind,

    /// Run without a visible window.
    pub headless: bool,

    /// Remote grid endpoint. None means a local driver.
    pub remote_endpoint: Option<String>,

    /// Opaque capability bag (credentials, platform hints) forwarded to the
    /// provider untouched.
    pub capabilities: HashMap<String, String>,

    /// Implicit wait, passed through to session provisioning only.
    pub implicit_wait_ms: u64,

    /// Page load timeout, passed through to session provisioning only.
    pub page_load_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chrome,
            headless: true,
            remote_endpoint: None,
            capabilities: HashMap::new(),
            implicit_wait_ms: 5_000,
            page_load_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit_wait_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Edge,
}

impl Default for BrowserKind {
    fn default() -> Self {
        Self::Chrome
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "edge" => Ok(Self::Edge),
            other => Err(format!("unknown browser: {}", other)),
        }
    }
}
