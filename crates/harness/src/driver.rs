//! Driver provisioning boundary
//!
//! Physical browser creation lives outside the harness. The provider hands
//! back an opaque session handle; the harness only tracks its lifecycle.

use async_trait::async_trait;
use gridrunner_common::{BrowserConfig, Result};
use std::sync::Arc;

/// Raw handle to a live browser automation connection, supplied by a
/// [`DriverProvider`]. The harness drives lifecycle and diagnostics through
/// this trait and never looks behind it.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// The provider's own identifier for this connection.
    fn session_id(&self) -> &str;

    /// Whether the underlying connection still responds. An unhealthy
    /// backend is replaced on the next acquire.
    async fn is_healthy(&self) -> bool;

    /// Capture a screenshot of the current browser state.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Tear the connection down. Called exactly once per session.
    async fn close(&self) -> Result<()>;

    /// Vendor-specific session status callback (e.g. a cloud grid marking
    /// the session passed/failed). Best-effort, defaults to a no-op.
    async fn report_status(&self, _passed: bool, _note: &str) -> Result<()> {
        Ok(())
    }
}

/// External collaborator that provisions browser sessions. The
/// [`BrowserConfig`] bag is passed through without interpretation.
#[async_trait]
pub trait DriverProvider: Send + Sync {
    async fn create_session(&self, config: &BrowserConfig) -> Result<Arc<dyn SessionBackend>>;
}
