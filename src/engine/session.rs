//! Session and checkpoint store.
//!
//! Sessions key in-flight run state so it can be inspected, overwritten, and
//! resumed between requests. The store is an injected interface rather than
//! process-global state; any backend with TTL support can implement it. The
//! bundled [`InMemorySessionStore`] backs it with a mutex-guarded map and
//! spawned sleep tasks for idle expiry.
//!
//! Invariant: at most one idle timer is armed per session. Arming replaces
//! the previous timer, and deletion always releases it, on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::state::RunState;
use crate::types::SessionId;

/// Store operation failures. Deletion is idempotent and never errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

/// Outcome of a rate-limit query.
///
/// `allowed` is evaluated as `count <= limit` on the pre-increment count, so
/// exactly one invocation past the nominal ceiling is admitted. That boundary
/// is intentional product behavior, not an off-by-one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub current_count: u32,
    pub remaining_count: u32,
}

/// Point-in-time copy of a session, without the timer handle.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: RunState,
    pub invocation_count: u32,
}

/// Keyed checkpoint storage with idle expiry and per-session rate limiting.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot a session, or `None` if absent.
    async fn get(&self, id: &str) -> Option<SessionSnapshot>;

    /// Create or replace a session's checkpointed state.
    async fn set(&self, id: &str, state: RunState);

    /// Overwrite an existing session's state. Unlike [`set`](Self::set),
    /// this fails when the session does not exist.
    async fn update(&self, id: &str, state: RunState) -> Result<(), SessionStoreError>;

    async fn has(&self, id: &str) -> bool;

    /// Remove a session and cancel its idle timer. Idempotent.
    async fn delete(&self, id: &str);

    /// Arm the idle timer; the session is deleted when it fires. Replaces
    /// any timer already armed for this id.
    async fn set_idle_timer(&self, id: &str, after: Duration);

    /// Disarm the idle timer without touching the session.
    async fn clear_idle_timer(&self, id: &str);

    /// Read-only rate-limit probe. Does not change the count and implicitly
    /// treats an absent session as count zero.
    async fn check_rate_limit(&self, id: &str) -> RateLimitStatus;

    /// Admission check plus increment: evaluates the limit on the current
    /// count, then counts this invocation. Creates the session entry when
    /// missing.
    async fn begin_invocation(&self, id: &str) -> RateLimitStatus;
}

struct SessionEntry {
    state: RunState,
    invocation_count: u32,
    idle_timer: Option<JoinHandle<()>>,
}

impl SessionEntry {
    fn new(state: RunState) -> Self {
        Self {
            state,
            invocation_count: 0,
            idle_timer: None,
        }
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.idle_timer.take() {
            handle.abort();
        }
    }
}

struct Inner {
    sessions: Mutex<FxHashMap<SessionId, SessionEntry>>,
    rate_limit: u32,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, FxHashMap<SessionId, SessionEntry>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn status_for(&self, count: u32) -> RateLimitStatus {
        RateLimitStatus {
            allowed: count <= self.rate_limit,
            current_count: count,
            remaining_count: self.rate_limit.saturating_sub(count),
        }
    }
}

/// In-process [`SessionStore`] backed by a mutex-guarded map.
#[derive(Clone)]
pub struct InMemorySessionStore {
    inner: Arc<Inner>,
}

impl InMemorySessionStore {
    /// `rate_limit` is the nominal per-session invocation ceiling.
    #[must_use]
    pub fn new(rate_limit: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(FxHashMap::default()),
                rate_limit,
            }),
        }
    }

    /// Number of live sessions. Diagnostic only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the session exists and has an armed idle timer.
    #[must_use]
    pub fn has_idle_timer(&self, id: &str) -> bool {
        self.inner
            .lock()
            .get(id)
            .is_some_and(|entry| entry.idle_timer.is_some())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<SessionSnapshot> {
        self.inner.lock().get(id).map(|entry| SessionSnapshot {
            id: id.to_string(),
            state: entry.state.clone(),
            invocation_count: entry.invocation_count,
        })
    }

    async fn set(&self, id: &str, state: RunState) {
        let mut sessions = self.inner.lock();
        match sessions.get_mut(id) {
            Some(entry) => entry.state = state,
            None => {
                sessions.insert(id.to_string(), SessionEntry::new(state));
            }
        }
    }

    async fn update(&self, id: &str, state: RunState) -> Result<(), SessionStoreError> {
        let mut sessions = self.inner.lock();
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.state = state;
                Ok(())
            }
            None => Err(SessionStoreError::NotFound(id.to_string())),
        }
    }

    async fn has(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    async fn delete(&self, id: &str) {
        let mut sessions = self.inner.lock();
        if let Some(mut entry) = sessions.remove(id) {
            entry.disarm();
            tracing::debug!(session_id = %id, "session deleted");
        }
    }

    async fn set_idle_timer(&self, id: &str, after: Duration) {
        let mut sessions = self.inner.lock();
        let Some(entry) = sessions.get_mut(id) else {
            return;
        };
        entry.disarm();
        let inner = Arc::clone(&self.inner);
        let session_id = id.to_string();
        entry.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut sessions = match inner.sessions.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if sessions.remove(&session_id).is_some() {
                tracing::info!(session_id = %session_id, "session expired after idle timeout");
            }
        }));
    }

    async fn clear_idle_timer(&self, id: &str) {
        let mut sessions = self.inner.lock();
        if let Some(entry) = sessions.get_mut(id) {
            entry.disarm();
        }
    }

    async fn check_rate_limit(&self, id: &str) -> RateLimitStatus {
        let sessions = self.inner.lock();
        let count = sessions.get(id).map_or(0, |entry| entry.invocation_count);
        self.inner.status_for(count)
    }

    async fn begin_invocation(&self, id: &str) -> RateLimitStatus {
        let mut sessions = self.inner.lock();
        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry::new(RunState::default()));
        let status = self.inner.status_for(entry.invocation_count);
        entry.invocation_count += 1;
        status
    }
}
