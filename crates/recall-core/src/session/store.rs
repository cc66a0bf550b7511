//! Registry of hot sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::Session;

/// Owned registry of hot sessions, keyed by session id.
///
/// The map lock is held only for the duration of a lookup or an in-place
/// update and never across an await, so different sessions never wait on
/// each other for I/O. Operations on the *same* session must still be
/// serialized by the caller.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of a session's hot state.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions().contains_key(session_id)
    }

    /// Cache `session` unless one is already present; returns the cached one.
    pub fn insert_if_absent(&self, session: Session) -> Session {
        self.sessions()
            .entry(session.session_id().to_string())
            .or_insert(session)
            .clone()
    }

    /// Mutate a session in place. `None` if the session is not hot.
    pub fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions().get_mut(session_id).map(f)
    }

    /// Mutate a session in place, creating empty hot state if it is missing.
    pub fn upsert<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        f(session)
    }

    /// Ids of all hot sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}
