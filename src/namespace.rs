//! Key namespacing.
//!
//! Every cookie this crate writes is named `<prefix><state key>`. The prefix keeps our
//! cookies apart from anything else set on the same origin, and lets bulk operations
//! (`load_all`, `remove_all`) find exactly the cookies they own.
//!
//! Wrapping strips one existing prefix before adding it again, so callers may pass a
//! raw state key or an already namespaced cookie key interchangeably:
//!
//! ```rust
//! use session_cookies::namespace::KeyNamespacer;
//!
//! let ns = KeyNamespacer::new("st_cookie__").unwrap();
//! let key = ns.wrap("my_number").unwrap();
//! assert_eq!(key.as_str(), "st_cookie__my_number");
//! assert_eq!(ns.wrap(key.as_str()).unwrap(), key);
//! assert_eq!(ns.unwrap(key.as_str()), "my_number");
//! ```
use std::fmt::Display;

use crate::errors::{Result, SyncError};

/// Name of a cookie owned by this crate (always carries the namespace prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CookieKey(String);

impl CookieKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for CookieKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CookieKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps state keys to cookie keys and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespacer {
    prefix: String,
}

impl KeyNamespacer {
    /// Creates a namespacer for `prefix`. The prefix itself must be a valid cookie name.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_token(&prefix)?;
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the cookie key for `key`, adding the prefix unless it is already there.
    pub fn wrap(&self, key: &str) -> Result<CookieKey> {
        let raw = self.unwrap(key);
        if raw.is_empty() {
            return Err(SyncError::invalid_key(key, "key is empty"));
        }
        validate_token(raw)?;
        Ok(CookieKey(format!("{}{}", self.prefix, raw)))
    }

    /// Strips the prefix if present; anything else is returned unchanged.
    pub fn unwrap<'a>(&self, cookie_key: &'a str) -> &'a str {
        cookie_key.strip_prefix(self.prefix.as_str()).unwrap_or(cookie_key)
    }

    pub fn is_namespaced(&self, key: &str) -> bool {
        key.starts_with(self.prefix.as_str())
    }

    /// Session key of the marker recording that `key` was hydrated this session.
    pub fn loaded_marker(&self, key: &CookieKey, suffix: &str) -> String {
        format!("{}{}", key.as_str(), suffix)
    }
}

/// Cookie names are RFC 6265 tokens: visible ASCII without separators.
fn validate_token(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SyncError::invalid_key(key, "key is empty"));
    }

    if let Some(c) = key.chars().find(|c| !is_token_char(*c)) {
        return Err(SyncError::invalid_key(
            key,
            format!("character {c:?} is not allowed in a cookie name"),
        ));
    }

    Ok(())
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic()
        && !matches!(
            c,
            '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
                | '{' | '}'
        )
}
