use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;

/// Name/value access to the cookies visible to one browser session.
///
/// Implementations are provided by the host. Values are the raw cookie strings; any
/// encoding is the caller's business.
///
/// ### Expectations
/// - `all_cookies` lists cookies in a stable order (the order the host reports them).
/// - Writes may be applied asynchronously. A `set_cookie` followed by `all_cookies`
///   is not required to observe the new value.
/// - Implementations must be `Send + Sync`; all methods take `&self`.
pub trait CookieStore: Send + Sync {
    /// Returns every cookie currently visible, keyed by cookie name.
    fn all_cookies(&self) -> Result<IndexMap<String, String>>;

    /// Sets (or replaces) the cookie `name`.
    fn set_cookie(&self, name: &str, value: &str) -> Result<()>;

    /// Removes the cookie `name`. Removing a missing cookie is not an error.
    fn remove_cookie(&self, name: &str) -> Result<()>;

    /// Returns the raw value of a single cookie.
    fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self.all_cookies()?.swap_remove(name))
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.all_cookies()?.contains_key(name))
    }
}

/// A handle to a cookie store trait object.
pub type CookieStoreHandle = Arc<dyn CookieStore>;
