use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use uuid::Uuid;

use crate::models::SessionState;

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3_600);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

pub type SessionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for conversation state.
pub trait SessionStore: Send + Sync {
    fn get<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, Option<SessionState>>;
    fn put(&self, state: SessionState) -> SessionFuture<'_, ()>;
    /// Returns whether a session was removed.
    fn delete<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRetention {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionRetention {
    fn default() -> Self {
        Self {
            idle_ttl: DEFAULT_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

struct StoredSession {
    state: SessionState,
    touched_at: Instant,
}

/// Process-local session registry with idle expiry and a hard capacity.
pub struct InMemorySessionStore {
    retention: SessionRetention,
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new(retention: SessionRetention) -> Self {
        Self {
            retention,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn retention(&self) -> SessionRetention {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions idle for longer than the TTL and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        sessions.retain(|_, stored| !self.is_expired(stored, now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "purged idle sessions");
        }
        purged
    }

    fn is_expired(&self, stored: &StoredSession, now: Instant) -> bool {
        now.saturating_duration_since(stored.touched_at) > self.retention.idle_ttl
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(&self, session_id: &str) -> Option<SessionState> {
        let now = Instant::now();
        let mut sessions = self.lock_sessions();
        let expired = sessions
            .get(session_id)
            .is_some_and(|stored| self.is_expired(stored, now));
        if expired {
            sessions.remove(session_id);
            return None;
        }
        sessions.get(session_id).map(|stored| stored.state.clone())
    }

    fn store(&self, state: SessionState) {
        let now = Instant::now();
        let mut sessions = self.lock_sessions();
        let session_id = state.id().to_string();

        if !sessions.contains_key(&session_id) && sessions.len() >= self.retention.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, stored)| stored.touched_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                debug!(evicted_session_id = %oldest, "evicted least recently used session");
            }
        }

        sessions.insert(
            session_id,
            StoredSession {
                state,
                touched_at: now,
            },
        );
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(SessionRetention::default())
    }
}

impl SessionStore for InMemorySessionStore {
    fn get<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, Option<SessionState>> {
        Box::pin(async move { Ok(self.load(session_id)) })
    }

    fn put(&self, state: SessionState) -> SessionFuture<'_, ()> {
        Box::pin(async move {
            self.store(state);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, bool> {
        Box::pin(async move { Ok(self.lock_sessions().remove(session_id).is_some()) })
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-session mutual exclusion. Handles that nobody holds are pruned on acquire.
#[derive(Default)]
pub(crate) struct SessionLocks {
    handles: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let handle = {
            let mut handles = match self.handles.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handles.retain(|id, handle| id == session_id || Arc::strong_count(handle) > 1);
            Arc::clone(handles.entry(session_id.to_string()).or_default())
        };

        handle.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        match self.handles.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
