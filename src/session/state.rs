use std::sync::Arc;

use crate::codec::Value;

/// Object-safe view of one session's state container.
///
/// Calls are synchronous and process-local for the duration of a run, so they are
/// infallible. Implementations synchronize internally; all methods take `&self`.
pub trait SessionState: Send + Sync {
    /// Retrieves the value stored under `key`, or `None` if not found.
    fn get(&self, key: &str) -> Option<Value>;

    /// Sets the value for `key`, overwriting any existing value.
    fn set(&self, key: &str, value: Value);

    /// Removes `key` and returns its previous value.
    fn remove(&self, key: &str) -> Option<Value>;

    /// Returns all keys currently stored.
    fn keys(&self) -> Vec<String>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Retrieves the value for `key`, falling back to `default`.
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

/// A handle to a session state trait object.
pub type SessionStateHandle = Arc<dyn SessionState>;
