//! Error types for GridRunner
//!
//! Driver-level failures are mapped into this closed taxonomy once, at the
//! boundary where they are first caught. Everything downstream (wait engine,
//! classifier, retry coordinator) matches on variants, never on strings from
//! foreign libraries.

use thiserror::Error;

/// Result type alias using GridRunner Error
pub type Result<T> = std::result::Result<T, Error>;

/// GridRunner error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Timed out waiting for {description} (last observed: {})", .last_seen.as_deref().unwrap_or("condition not satisfied"))]
    WaitTimeout {
        description: String,
        last_seen: Option<String>,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Scenario skipped: {0}")]
    Skip(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("Browser session lost: {0}")]
    SessionLost(String),

    #[error("Browser window closed: {0}")]
    WindowClosed(String),

    #[error("Remote endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Socket timeout: {0}")]
    SocketTimeout(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session teardown failed: {0}")]
    Teardown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap this error with the step it occurred in. Classification follows
    /// the source chain, so wrapping never changes how an error is treated.
    pub fn context(self, step: impl Into<String>) -> Self {
        Error::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// True for errors that abort a wait immediately instead of being
    /// treated as "condition not yet satisfied". A probe observing one of
    /// these is seeing a dead session; waiting out the deadline is pointless.
    pub fn is_wait_fatal(&self) -> bool {
        match self {
            Error::SessionLost(_) | Error::WindowClosed(_) | Error::Unreachable(_) => true,
            Error::Step { source, .. } => source.is_wait_fatal(),
            _ => false,
        }
    }

    /// True for explicit skip signals, which are not failures.
    pub fn is_skip(&self) -> bool {
        match self {
            Error::Skip(_) => true,
            Error::Step { source, .. } => source.is_skip(),
            _ => false,
        }
    }
}
