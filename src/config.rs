use serde::{Deserialize, Serialize};

/// Prefix put in front of every cookie name owned by this crate.
pub const DEFAULT_KEY_PREFIX: &str = "st_cookie__";

/// Appended to a cookie key to form the session key of its loaded marker.
pub const DEFAULT_LOADED_MARKER_SUFFIX: &str = "-loaded";

/// What to do when a cookie carries a value that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Log a warning and treat the cookie as absent.
    #[default]
    Ignore,
    /// Return [`SyncError::Serialization`](crate::errors::SyncError::Serialization) to the caller.
    Raise,
}

/// Configuration for a [`CookieSync`](crate::sync::CookieSync) coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Namespace prefix for cookie names. Must be a valid cookie-name token.
    pub key_prefix: String,
    /// Suffix of the per-key "already hydrated" marker kept in session state
    pub loaded_marker_suffix: String,
    /// Read-path policy for corrupt cookies
    pub decode_failure: DecodeFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            loaded_marker_suffix: DEFAULT_LOADED_MARKER_SUFFIX.to_string(),
            decode_failure: DecodeFailurePolicy::Ignore,
        }
    }
}

impl SyncConfig {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_loaded_marker_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.loaded_marker_suffix = suffix.into();
        self
    }

    pub fn with_decode_failure(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_failure = policy;
        self
    }
}
