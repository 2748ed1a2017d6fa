//! Session registry - worker-keyed browser session lifecycle
//!
//! Each worker exclusively owns at most one session. The registry holds the
//! worker-to-session mapping for lookup and teardown; it never shares a
//! session across workers.

use crate::driver::{DriverProvider, SessionBackend};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gridrunner_common::{BrowserConfig, Result, SessionState, WorkerId};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An exclusive, worker-owned handle to a live browser session.
pub struct Session {
    id: Uuid,
    owner: WorkerId,
    state: RwLock<SessionState>,
    backend: Arc<dyn SessionBackend>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(owner: WorkerId, backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            state: RwLock::new(SessionState::Uninitialized),
            backend,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &WorkerId {
        &self.owner
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn transition(&self, to: SessionState) {
        *self.state.write() = to;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("state", &self.state())
            .field("backend", &self.backend.session_id())
            .finish()
    }
}

/// Worker-keyed registry of browser sessions.
pub struct SessionRegistry {
    provider: Arc<dyn DriverProvider>,
    browser: BrowserConfig,
    sessions: DashMap<WorkerId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn DriverProvider>, browser: BrowserConfig) -> Self {
        Self {
            provider,
            browser,
            sessions: DashMap::new(),
        }
    }

    /// Return the worker's existing session if it is active and healthy,
    /// otherwise create a new one. Idempotent per worker: calling twice
    /// without an intervening `release` returns the same session.
    pub async fn acquire(&self, worker: &WorkerId) -> Result<Arc<Session>> {
        if let Some(existing) = self.lookup(worker) {
            if existing.is_active() && existing.backend().is_healthy().await {
                debug!("Reusing session {} for {}", existing.id(), worker);
                return Ok(existing);
            }
            warn!("Session {} for {} is unhealthy - replacing", existing.id(), worker);
            self.sessions.remove(worker);
            self.teardown(existing).await;
        }

        let session = self.open_session(worker).await?;
        self.sessions.insert(worker.clone(), session.clone());
        Ok(session)
    }

    /// Tear down and forget the worker's session. Calling `release` when no
    /// session exists is a no-op, not an error.
    pub async fn release(&self, worker: &WorkerId) {
        match self.sessions.remove(worker) {
            Some((_, session)) => {
                info!("Releasing session {} for {}", session.id(), worker);
                self.teardown(session).await;
            }
            None => debug!("release for {} with no session - ignoring", worker),
        }
    }

    /// Force teardown and removal even if the session nominally looks
    /// active. The next `acquire` creates a fresh session.
    pub async fn invalidate(&self, worker: &WorkerId) {
        if let Some((_, session)) = self.sessions.remove(worker) {
            warn!("Invalidating session {} for {}", session.id(), worker);
            self.teardown(session).await;
        }
    }

    /// Current session for a worker, if any.
    pub fn lookup(&self, worker: &WorkerId) -> Option<Arc<Session>> {
        self.sessions.get(worker).map(|entry| entry.value().clone())
    }

    /// Number of live sessions across all workers.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    async fn open_session(&self, worker: &WorkerId) -> Result<Arc<Session>> {
        let backend = self.provider.create_session(&self.browser).await?;
        let session = Arc::new(Session::new(worker.clone(), backend));
        session.transition(SessionState::Active);
        info!(
            "Session {} ({}) initialized for {}",
            session.id(),
            session.backend().session_id(),
            worker
        );
        Ok(session)
    }

    /// Best-effort teardown. Failures are logged and swallowed so they can
    /// never mask the scenario's real outcome.
    async fn teardown(&self, session: Arc<Session>) {
        {
            let mut state = session.state.write();
            if matches!(*state, SessionState::Closing | SessionState::Closed) {
                return;
            }
            *state = SessionState::Closing;
        }

        if let Err(e) = session.backend().close().await {
            warn!("Teardown of session {} failed (ignored): {}", session.id(), e);
        }
        session.transition(SessionState::Closed);
        debug!("Session {} closed", session.id());
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
