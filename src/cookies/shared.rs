use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use crate::cookies::CookieStoreHandle;

type Factory = Box<dyn Fn() -> Result<CookieStoreHandle> + Send + Sync>;

/// Lazily created cookie store handle shared by all sessions of a process.
///
/// The factory runs on first use, under a mutex, so concurrent first calls still create
/// exactly one store. A failing factory leaves the slot empty and the next call retries.
///
/// ```rust
/// use std::sync::Arc;
/// use session_cookies::cookies::{CookieStoreHandle, InMemoryCookieStore, SharedCookieStore};
///
/// let shared = SharedCookieStore::new(|| Ok(Arc::new(InMemoryCookieStore::new()) as CookieStoreHandle));
/// let a = shared.get().unwrap();
/// let b = shared.get().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct SharedCookieStore {
    factory: Factory,
    handle: Mutex<Option<CookieStoreHandle>>,
}

impl SharedCookieStore {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<CookieStoreHandle> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            handle: Mutex::new(None),
        }
    }

    /// Returns the shared handle, creating it on first call.
    pub fn get(&self) -> Result<CookieStoreHandle> {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let handle = (self.factory)()?;
        log::info!("created shared cookie store handle");
        *slot = Some(handle.clone());
        Ok(handle)
    }

    pub fn is_initialized(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Debug for SharedCookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCookieStore")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
