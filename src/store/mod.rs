//! Persistence boundary for sessions.
//!
//! A [`SessionStore`] holds durable sessions only: drafts are rejected by
//! `put` and never returned by `list`. Three implementations exist:
//!
//! - [`MemorySessionStore`]: an in-process map.
//! - [`LocalSessionStore`]: a JSON file private to this machine and user.
//! - [`RemoteSessionStore`]: the backend's history endpoints.

mod local;
mod remote;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Error, Result, Session};

pub use local::LocalSessionStore;
pub use remote::RemoteSessionStore;

/// Key-value persistence of sessions.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch one session; a missing session is a not-found error.
    async fn get(&self, session_id: &str) -> Result<Session>;

    /// List durable sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<Session>>;

    /// Insert or replace a durable session.
    async fn put(&self, session: Session) -> Result<()>;

    /// Remove a session; removing an unknown id succeeds.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Remove every session.
    async fn clear(&self) -> Result<()>;
}

/// Rejects sessions that must not be persisted.
pub(crate) fn ensure_durable(session: &Session) -> Result<()> {
    if session.is_draft() {
        return Err(Error::validation(
            format!("session {} has no turns and cannot be stored", session.id),
            Some("turns".to_string()),
        ));
    }
    Ok(())
}

/// Keeps durable sessions and orders them most recently updated first.
pub(crate) fn listing(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.retain(Session::is_durable);
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sessions
}

/// An in-process session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sessions<T>(&self, f: impl FnOnce(&mut HashMap<String, Session>) -> T) -> Result<T> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::store("memory store lock poisoned", None))?;
        Ok(f(&mut sessions))
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Session> {
        self.with_sessions(|sessions| sessions.get(session_id).cloned())?
            .ok_or_else(|| Error::session_not_found(session_id))
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let sessions = self.with_sessions(|sessions| sessions.values().cloned().collect())?;
        Ok(listing(sessions))
    }

    async fn put(&self, session: Session) -> Result<()> {
        ensure_durable(&session)?;
        self.with_sessions(|sessions| {
            sessions.insert(session.id.clone(), session);
        })
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.with_sessions(|sessions| {
            sessions.remove(session_id);
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_sessions(HashMap::clear)
    }
}
