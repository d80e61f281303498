use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::Value;
use crate::session::{SessionState, SessionStateHandle};

/// A unique identifier for a browser session, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session state for one session, kept in memory.
#[derive(Debug, Default)]
pub struct InMemorySessionState {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemorySessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionState for InMemorySessionState {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    fn has(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

/// Mints one isolated [`InMemorySessionState`] per session.
///
/// Asking twice for the same session returns the same state. A dropped session starts
/// over empty, which is how a host resets loaded markers.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<InMemorySessionState>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (or creates) the state for `session`.
    pub fn state_for(&self, session: SessionId) -> SessionStateHandle {
        if let Some(state) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
        {
            return state.clone();
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(session).or_default().clone()
    }

    /// Forgets everything stored for `session`.
    pub fn drop_session(&self, session: SessionId) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
        if removed.is_some() {
            log::debug!("dropped session state for {}", session);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
