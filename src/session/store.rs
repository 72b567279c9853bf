use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use uuid::Uuid;

use super::state::{ClientId, Session};
use super::SessionError;

/// Shared handle to one session. Commands for the same client serialize on
/// its mutex; tokio's mutex is FIFO, so they run in arrival order.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    scope: Arc<str>,
    state: Arc<Mutex<Session>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            scope: Arc::from(session.storage_scope()),
            state: Arc::new(Mutex::new(session)),
        }
    }

    /// Photo storage scope, readable without taking the lock.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().await
    }

    /// Lock for the duration of a command that outlives the borrow of the handle.
    pub async fn lock_owned(&self) -> OwnedMutexGuard<Session> {
        Arc::clone(&self.state).lock_owned().await
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Session>> {
        self.state.try_lock().ok()
    }

    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Live sessions keyed by client id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ClientId, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session, replacing any existing one. The replaced
    /// handle is returned so its photos can be released.
    pub fn create(&self, id: &ClientId) -> (SessionHandle, Option<SessionHandle>) {
        let scope = format!("{}-{}", sanitize_scope(id.as_str()), Uuid::new_v4().simple());
        let handle = SessionHandle::new(Session::new(id.clone(), scope));
        let previous = self.sessions.insert(id.clone(), handle.clone());
        tracing::debug!(client = %id, replaced = previous.is_some(), "Session created");
        (handle, previous)
    }

    pub fn get(&self, id: &ClientId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Remove unconditionally. Does not wait for in-flight commands.
    pub fn remove(&self, id: &ClientId) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    /// Remove only if `handle` is still the live session for `id`.
    pub fn remove_if_current(&self, id: &ClientId, handle: &SessionHandle) -> bool {
        self.sessions
            .remove_if(id, |_, current| current.same_session(handle))
            .is_some()
    }

    /// True when `handle` is still the live session for `id`.
    pub fn is_current(&self, id: &ClientId, handle: &SessionHandle) -> bool {
        self.sessions
            .get(id)
            .map(|entry| entry.value().same_session(handle))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions idle for longer than `ttl`. Sessions locked by an
    /// in-flight command are skipped; they are active by definition.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<SessionHandle> {
        let candidates: Vec<(ClientId, SessionHandle)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut evicted = Vec::new();
        for (id, handle) in candidates {
            let expired = match handle.try_lock() {
                Some(session) => session.idle_for() > ttl,
                None => false,
            };
            if expired && self.remove_if_current(&id, &handle) {
                tracing::info!(client = %id, "Session expired");
                evicted.push(handle);
            }
        }
        evicted
    }
}

/// Keep scope names filesystem-safe.
fn sanitize_scope(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "client".to_string()
    } else {
        cleaned
    }
}
